//! Key-character-map resolution and overlay layering (§4.4).
//!
//! Parsing the on-disk key-character-map format is out of scope (§1, external collaborators); this
//! module only resolves *which* file(s) apply to a device and layers an optional runtime overlay
//! on top of the parsed result, following the trait-seam pattern used for
//! [`crate::capability_probe::CapabilitySource`].

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A parsed key-character map: scan code -> logical key code.
pub type KeyCharacterMap = HashMap<u16, u16>;

/// Parses a key-character-map file on disk. Implemented elsewhere; this crate only resolves
/// paths and layers the result.
pub trait KeyCharacterMapParser {
    fn parse(&self, path: &Path) -> Result<KeyCharacterMap>;
}

/// The parser this crate plugs into `KeyMapLoader` when no host-supplied parser is configured.
/// Every path fails to parse, so `load_base` falls through its non-fatal fallback chain to an
/// empty map rather than leaving the loader unreachable from the production path.
pub struct UnimplementedKeyCharacterMapParser;

impl KeyCharacterMapParser for UnimplementedKeyCharacterMapParser {
    fn parse(&self, _path: &Path) -> Result<KeyCharacterMap> {
        Err(Error::Unsupported("key-character-map parsing is not implemented by this crate".into()))
    }
}

/// Resolves and layers base + overlay key-character maps for one device.
pub struct KeyMapLoader<'p> {
    parser: &'p dyn KeyCharacterMapParser,
    search_dirs: Vec<PathBuf>,
    generic_map_name: String,
}

impl<'p> KeyMapLoader<'p> {
    pub fn new(parser: &'p dyn KeyCharacterMapParser, search_dirs: Vec<PathBuf>) -> Self {
        KeyMapLoader {
            parser,
            search_dirs,
            generic_map_name: "Generic".to_string(),
        }
    }

    fn candidate_path(&self, dir: &Path, device_descriptor: &str) -> PathBuf {
        dir.join(format!("{device_descriptor}.kcm"))
    }

    fn generic_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.kcm", self.generic_map_name))
    }

    /// Loads the base map for `device_descriptor`, falling back to the generic map, and an
    /// optional override path from per-device configuration (§4.10). Failure to find or parse
    /// any candidate is non-fatal: returns an empty map so the device remains usable.
    pub fn load_base(&self, device_descriptor: &str, config_override: Option<&Path>) -> KeyCharacterMap {
        if let Some(path) = config_override {
            if let Ok(map) = self.parser.parse(path) {
                return map;
            }
            log::warn!("configured keymap override {path:?} failed to load, falling back");
        }

        for dir in &self.search_dirs {
            let specific = self.candidate_path(dir, device_descriptor);
            if specific.exists() {
                match self.parser.parse(&specific) {
                    Ok(map) => return map,
                    Err(e) => log::warn!("keymap {specific:?} failed to parse: {e}"),
                }
            }
        }
        for dir in &self.search_dirs {
            let generic = self.generic_path(dir);
            if generic.exists() {
                match self.parser.parse(&generic) {
                    Ok(map) => return map,
                    Err(e) => log::warn!("generic keymap {generic:?} failed to parse: {e}"),
                }
            }
        }
        KeyCharacterMap::new()
    }
}

/// A base map with an optional runtime-injected overlay layered over it; queries see the overlay
/// first, then fall through to the base.
#[derive(Clone, Debug, Default)]
pub struct LayeredKeyMap {
    base: KeyCharacterMap,
    overlay: Option<KeyCharacterMap>,
}

impl LayeredKeyMap {
    pub fn new(base: KeyCharacterMap) -> Self {
        LayeredKeyMap { base, overlay: None }
    }

    pub fn set_overlay(&mut self, overlay: KeyCharacterMap) {
        self.overlay = Some(overlay);
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    /// Maps a scan code to a logical key code, `NotFound` if neither layer knows it.
    pub fn map_key(&self, scan_code: u16) -> Result<u16> {
        if let Some(overlay) = &self.overlay {
            if let Some(code) = overlay.get(&scan_code) {
                return Ok(*code);
            }
        }
        self.base
            .get(&scan_code)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("scan code {scan_code:#x} has no key mapping")))
    }

    /// Reverse lookup: the scan code that maps to `key_code`, if any (§4.8 `get_key_code_state`).
    /// Overlay entries are searched first so a runtime remap takes priority, matching `map_key`.
    pub fn scan_code_for_key_code(&self, key_code: u16) -> Option<u16> {
        if let Some(overlay) = &self.overlay {
            if let Some((&scan_code, _)) = overlay.iter().find(|(_, &v)| v == key_code) {
                return Some(scan_code);
            }
        }
        self.base.iter().find(|(_, &v)| v == key_code).map(|(&scan_code, _)| scan_code)
    }

    /// The effective key-character map seen by a consumer: overlay entries shadow base entries.
    pub fn combined(&self) -> KeyCharacterMap {
        let mut combined = self.base.clone();
        if let Some(overlay) = &self.overlay {
            combined.extend(overlay.iter().map(|(k, v)| (*k, *v)));
        }
        combined
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.overlay.as_ref().map_or(true, |o| o.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticParser(KeyCharacterMap);

    impl KeyCharacterMapParser for StaticParser {
        fn parse(&self, _path: &Path) -> Result<KeyCharacterMap> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn overlay_shadows_base() {
        let mut map = LayeredKeyMap::new(HashMap::from([(30, 1)]));
        assert_eq!(map.map_key(30).unwrap(), 1);
        map.set_overlay(HashMap::from([(30, 99)]));
        assert_eq!(map.map_key(30).unwrap(), 99);
        map.clear_overlay();
        assert_eq!(map.map_key(30).unwrap(), 1);
    }

    #[test]
    fn missing_key_is_not_found() {
        let map = LayeredKeyMap::new(HashMap::new());
        assert!(map.map_key(1).is_err());
    }

    #[test]
    fn scan_code_for_key_code_reverses_map_key_and_prefers_the_overlay() {
        let mut map = LayeredKeyMap::new(HashMap::from([(30, 1)]));
        assert_eq!(map.scan_code_for_key_code(1), Some(30));
        assert_eq!(map.scan_code_for_key_code(99), None);
        map.set_overlay(HashMap::from([(31, 1)]));
        assert_eq!(map.scan_code_for_key_code(1), Some(31));
    }

    #[test]
    fn unimplemented_parser_always_fails() {
        let parser = UnimplementedKeyCharacterMapParser;
        assert!(parser.parse(Path::new("/any/path.kcm")).is_err());
    }

    #[test]
    fn falls_back_to_generic_map_when_specific_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Generic.kcm"), b"").unwrap();
        let parser = StaticParser(HashMap::from([(1, 2)]));
        let loader = KeyMapLoader::new(&parser, vec![dir.path().to_path_buf()]);
        let loaded = loader.load_base("no-such-descriptor", None);
        assert_eq!(loaded.get(&1), Some(&2));
    }

    #[test]
    fn missing_everything_yields_empty_map_not_an_error() {
        let parser = StaticParser(HashMap::new());
        let loader = KeyMapLoader::new(&parser, vec![]);
        let loaded = loader.load_base("whatever", None);
        assert!(loaded.is_empty());
    }
}
