//! Typed hub configuration (§4.10, §6).
//!
//! `HubConfig` is loaded once at hub construction from an optional TOML path. A missing or
//! malformed file is not fatal: the caller gets `HubConfig::default()` back and a warning is
//! logged, matching the same non-fatal posture as a keymap load failure (§7).

use glob::Pattern;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_input_directory() -> PathBuf {
    PathBuf::from("/dev/input")
}

fn default_video_directory() -> PathBuf {
    PathBuf::from("/dev/v4l-touch")
}

fn default_keymap_directory() -> PathBuf {
    PathBuf::from("/system/usr/keychars")
}

fn default_device_config_directory() -> PathBuf {
    PathBuf::from("/data/system/devices")
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub excluded_devices: Vec<String>,
    pub virtual_keyboard: bool,
    #[serde(default = "default_video_directory")]
    pub video_directory: PathBuf,
    #[serde(default = "default_input_directory")]
    pub input_directory: PathBuf,
    /// Search directory for `<descriptor>.kcm`/`Generic.kcm` key-character maps (§4.4).
    #[serde(default = "default_keymap_directory")]
    pub keymap_directory: PathBuf,
    /// Directory holding per-device `<descriptor>.toml` overlays (§4.3 rule 7, §4.9, §4.10).
    #[serde(default = "default_device_config_directory")]
    pub device_config_directory: PathBuf,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            excluded_devices: Vec::new(),
            virtual_keyboard: false,
            video_directory: default_video_directory(),
            input_directory: default_input_directory(),
            keymap_directory: default_keymap_directory(),
            device_config_directory: default_device_config_directory(),
        }
    }
}

impl HubConfig {
    /// Loads configuration from `path`. A missing file is treated the same as a malformed one:
    /// logs a warning and returns the default.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return HubConfig::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("failed to parse hub config at {path:?}: {e}, using defaults");
                    HubConfig::default()
                }
            },
            Err(e) => {
                log::warn!("failed to read hub config at {path:?}: {e}, using defaults");
                HubConfig::default()
            }
        }
    }

    /// `true` if `device_path` matches one of the `excluded_devices` globs. An excluded path is
    /// never opened, probed, or logged as an error (§4.10).
    pub fn is_excluded(&self, device_path: &Path) -> bool {
        let path_str = device_path.to_string_lossy();
        self.excluded_devices.iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches(&path_str))
                .unwrap_or(false)
        })
    }
}

/// Per-device configuration overlay keyed by `InputDeviceIdentifier::descriptor` (§4.3 rule 7,
/// §4.10). Absence is the common case and is not logged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DeviceConfig {
    /// Overrides the per-device LED scan-code table (abstract LED code -> device scan code).
    #[serde(default)]
    pub led_overrides: std::collections::HashMap<String, u16>,
    /// Overrides the resolved key-character-map path for this device.
    pub keymap_path: Option<PathBuf>,
}

impl DeviceConfig {
    /// Loads a per-device config fragment from `dir/<descriptor>.toml`, silently returning the
    /// default when absent.
    pub fn load_for_descriptor(dir: &Path, descriptor: &str) -> Self {
        let path = dir.join(format!("{descriptor}.toml"));
        match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).unwrap_or_default(),
            Err(_) => DeviceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = HubConfig::load(Some(Path::new("/nonexistent/path/for/testing.toml")));
        assert!(config.excluded_devices.is_empty());
        assert_eq!(config.input_directory, default_input_directory());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "not valid = = toml").unwrap();
        let config = HubConfig::load(Some(&path));
        assert!(config.excluded_devices.is_empty());
    }

    #[test]
    fn excluded_devices_matches_glob() {
        let config = HubConfig {
            excluded_devices: vec!["/dev/input/event1*".to_string()],
            ..HubConfig::default()
        };
        assert!(config.is_excluded(Path::new("/dev/input/event10")));
        assert!(!config.is_excluded(Path::new("/dev/input/event2")));
    }

    #[test]
    fn defaults_include_keymap_and_device_config_directories() {
        let config = HubConfig::default();
        assert_eq!(config.keymap_directory, default_keymap_directory());
        assert_eq!(config.device_config_directory, default_device_config_directory());
    }

    #[test]
    fn device_config_loads_led_overrides_and_keymap_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("my-pad.toml"),
            "keymap_path = \"/etc/evhub/my-pad.kcm\"\n[led_overrides]\nLED_CAPSL = 12\n",
        )
        .unwrap();
        let config = DeviceConfig::load_for_descriptor(dir.path(), "my-pad");
        assert_eq!(config.led_overrides.get("LED_CAPSL"), Some(&12));
        assert_eq!(config.keymap_path, Some(PathBuf::from("/etc/evhub/my-pad.kcm")));
    }

    #[test]
    fn device_config_for_unknown_descriptor_is_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = DeviceConfig::load_for_descriptor(dir.path(), "no-such-device");
        assert!(config.led_overrides.is_empty());
        assert!(config.keymap_path.is_none());
    }

    #[test]
    fn valid_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(&path, "excluded_devices = [\"/dev/input/eventX\"]\nvirtual_keyboard = true\n").unwrap();
        let config = HubConfig::load(Some(&path));
        assert!(config.virtual_keyboard);
        assert_eq!(config.excluded_devices, vec!["/dev/input/eventX".to_string()]);
    }
}
