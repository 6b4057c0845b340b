//! The public `EventHub`: the blocking event stream plus the capability/state query surface
//! (§4.7, §4.8, §4.9, §5).
//!
//! Everything that mutates shared state goes through one `Mutex<HubState>` (§5); the epoll/
//! inotify pump is released across its own `wait` call but otherwise touched only by the reader
//! thread that drives `get_events`.

use crate::config::HubConfig;
use crate::constants::{AbsoluteAxisCode, LedCode};
use crate::device_manager::{DeviceManager, DeviceOpener};
use crate::device_record::FdCapabilitySource;
use crate::epoll_pump::{EpollPump, InotifyDirectory, WakeSource};
use crate::error::{Error, Result};
use crate::ff::FFEffectData;
use crate::keymap::KeyCharacterMap;
use crate::raw_event::{DeviceClassSet, DeviceId, RawEvent};
use nix::sys::inotify::AddWatchFlags;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Result of a state query (§4.8): either a definite key/switch position, a raw axis value, or
/// `Unknown` for a missing or disabled device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateValue {
    Unknown,
    Up,
    Down,
    Value(i32),
}

struct HubState {
    manager: DeviceManager,
    pending_closes: VecDeque<DeviceId>,
    pending_opens: VecDeque<PathBuf>,
    leftover_batch: VecDeque<WakeSource>,
}

/// The kernel-facing input event hub (§1). One instance per process; the controller pool and
/// device registry live on it, not behind a hidden global.
pub struct EventHub {
    opener: Box<dyn DeviceOpener + Send + Sync>,
    pump: EpollPump,
    config: HubConfig,
    state: Mutex<HubState>,
}

impl EventHub {
    pub fn new(opener: Box<dyn DeviceOpener + Send + Sync>, config: HubConfig) -> Result<Self> {
        let pump = EpollPump::new(&config.input_directory, &config.video_directory)?;
        let mut manager = DeviceManager::new();
        if config.virtual_keyboard {
            manager.insert_virtual_keyboard();
        }
        Ok(EventHub {
            opener,
            pump,
            config,
            state: Mutex::new(HubState {
                manager,
                pending_closes: VecDeque::new(),
                pending_opens: VecDeque::new(),
                leftover_batch: VecDeque::new(),
            }),
        })
    }

    /// Wakes a blocked `get_events` call from any thread (§5, cancellation).
    pub fn wake(&self) -> Result<()> {
        self.pump.wake()
    }

    /// A try-lock probe for an external watchdog: returns `false` if the hub lock appears stuck.
    pub fn monitor(&self) -> bool {
        self.state.try_lock().is_ok()
    }

    /// The central blocking entry point (§4.7). One call is one "turn": it never loops
    /// internally past a single `EpollPump::wait`, so unconsumed readiness is preserved for the
    /// caller's next call rather than retried here.
    pub fn get_events(&self, timeout_ms: i32, capacity: usize, now_ns: i64) -> Result<Vec<RawEvent>> {
        let mut out = Vec::new();
        if capacity == 0 {
            return Ok(out);
        }

        let mut state = self.state.lock().unwrap();

        while let Some(id) = state.pending_closes.pop_front() {
            state.manager.close(id, &self.pump, now_ns, &mut out)?;
            if out.len() >= capacity {
                return Ok(out);
            }
        }

        if state.manager.take_pending_reopen() {
            state.manager.close_all_for_reopen(&self.pump, now_ns, &mut out)?;
            if out.len() >= capacity {
                return Ok(out);
            }
        }

        if state.manager.take_pending_scan() {
            state.manager.scan_all(self.opener.as_ref(), &self.pump, &self.config, now_ns, &mut out)?;
            if out.len() >= capacity {
                return Ok(out);
            }
        }

        while let Some(path) = state.pending_opens.pop_front() {
            if !self.config.is_excluded(&path) {
                let _ = state
                    .manager
                    .open_device(&path, self.opener.as_ref(), &self.pump, &self.config, now_ns, &mut out);
            }
            if out.len() >= capacity {
                return Ok(out);
            }
        }

        let batch: Vec<WakeSource> = if !state.leftover_batch.is_empty() {
            state.leftover_batch.drain(..).collect()
        } else {
            drop(state);
            let events = self.pump.wait(timeout_ms)?;
            state = self.state.lock().unwrap();
            events
        };

        if batch.is_empty() {
            return Ok(out);
        }

        for (i, event) in batch.iter().enumerate() {
            match *event {
                WakeSource::WakePipe => self.pump.drain_wake_pipe(),
                WakeSource::Inotify => {
                    for (dir, ev) in self.pump.drain_inotify()? {
                        let Some(name) = ev.name.as_ref().and_then(|n| n.to_str()) else {
                            continue;
                        };
                        let base_dir = match dir {
                            InotifyDirectory::Input => &self.config.input_directory,
                            InotifyDirectory::Video => &self.config.video_directory,
                        };
                        let path = base_dir.join(name);
                        if ev.mask.contains(AddWatchFlags::IN_CREATE) || ev.mask.contains(AddWatchFlags::IN_MOVED_TO) {
                            match dir {
                                InotifyDirectory::Input => state.pending_opens.push_back(path),
                                InotifyDirectory::Video => {
                                    if !self.config.is_excluded(&path) {
                                        let _ =
                                            state.manager.open_video_device(&path, self.opener.as_ref(), &self.pump);
                                    }
                                }
                            }
                        } else if ev.mask.contains(AddWatchFlags::IN_DELETE) || ev.mask.contains(AddWatchFlags::IN_MOVED_FROM) {
                            if let InotifyDirectory::Input = dir {
                                state.manager.close_by_path(&path, &self.pump, now_ns, &mut out)?;
                            }
                        }
                    }
                }
                WakeSource::Device(fd) => {
                    let device_id = state.manager.devices().find(|d| d.raw_fd() == Some(fd)).map(|d| d.id);
                    if let Some(id) = device_id {
                        let mut decoded = Vec::new();
                        let result = state
                            .manager
                            .device_mut(id)
                            .map(|record| record.read_events(&mut decoded))
                            .unwrap_or(Ok(()));
                        for (_, type_, code, value) in decoded {
                            out.push(RawEvent {
                                timestamp_ns: now_ns,
                                device_id: id,
                                event_type: type_,
                                code,
                                value,
                            });
                        }
                        if let Err(Error::IoError(_)) = result {
                            state.pending_closes.push_back(id);
                        }
                    } else if let Some(video) = state.manager.video_device_mut(fd) {
                        if let Err(Error::IoError(_)) = video.read_frames(now_ns) {
                            let _ = self.pump.unregister_fd(fd);
                        }
                    }
                }
            }
            if out.len() >= capacity {
                state.leftover_batch = batch[i + 1..].iter().copied().collect();
                return Ok(out);
            }
        }

        Ok(out)
    }

    // --- State queries (§4.8) ---

    /// The raw evdev scan code's state: prefers the cached live-state mirror, priming it from a
    /// direct `EVIOCGKEY` on the first query after open (§4.8).
    pub fn get_scan_code_state(&self, id: DeviceId, scan_code: u16) -> StateValue {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.manager.device_mut(id) else {
            return StateValue::Unknown;
        };
        if record.is_disabled() || !record.key_mask().test(scan_code as usize) {
            return StateValue::Unknown;
        }
        if let Err(e) = record.ensure_live_state_synced() {
            log::warn!("live-state sync failed for device {id}: {e}");
        }
        if record.live.key(scan_code) {
            StateValue::Down
        } else {
            StateValue::Up
        }
    }

    /// A logical key code's state: maps `key_code` through the device's keymap to find the
    /// underlying scan code, then delegates to the same cached-mirror/ioctl-fallback logic as
    /// `get_scan_code_state` (§4.8). `Unknown` if the keymap has no entry for `key_code`.
    pub fn get_key_code_state(&self, id: DeviceId, key_code: u16) -> StateValue {
        let scan_code = {
            let state = self.state.lock().unwrap();
            let Some(record) = state.manager.device(id) else {
                return StateValue::Unknown;
            };
            match record.keymap.scan_code_for_key_code(key_code) {
                Some(scan_code) => scan_code,
                None => return StateValue::Unknown,
            }
        };
        self.get_scan_code_state(id, scan_code)
    }

    pub fn get_switch_state(&self, id: DeviceId, code: u16) -> StateValue {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.manager.device_mut(id) else {
            return StateValue::Unknown;
        };
        if record.is_disabled() || !record.sw_mask().test(code as usize) {
            return StateValue::Unknown;
        }
        if let Err(e) = record.ensure_live_state_synced() {
            log::warn!("live-state sync failed for device {id}: {e}");
        }
        if record.live.switch(code) {
            StateValue::Down
        } else {
            StateValue::Up
        }
    }

    pub fn get_absolute_axis_value(&self, id: DeviceId, axis: AbsoluteAxisCode) -> StateValue {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.manager.device_mut(id) else {
            return StateValue::Unknown;
        };
        if record.is_disabled() || !record.abs_mask().test(axis.0 as usize) {
            return StateValue::Unknown;
        }
        if let Err(e) = record.ensure_live_state_synced() {
            log::warn!("live-state sync failed for device {id}: {e}");
        }
        StateValue::Value(record.live.abs_value(axis))
    }

    /// The effective key-character map for `id` (§4.4, §6): overlay entries shadow the loaded
    /// base map. Empty for an unknown device or one with no resolvable keymap.
    pub fn get_key_character_map(&self, id: DeviceId) -> KeyCharacterMap {
        let state = self.state.lock().unwrap();
        state.manager.device(id).map(|r| r.keymap.combined()).unwrap_or_default()
    }

    pub fn get_device_classes(&self, id: DeviceId) -> DeviceClassSet {
        let state = self.state.lock().unwrap();
        state.manager.device(id).map(|r| r.classes).unwrap_or_default()
    }

    /// Checks presence of each scan code through the loaded keymap or the kernel key bitmask
    /// (§4.8 `mark_supported_key_codes`).
    pub fn mark_supported_key_codes(&self, id: DeviceId, codes: &[u16]) -> Vec<bool> {
        let state = self.state.lock().unwrap();
        let Some(record) = state.manager.device(id) else {
            return vec![false; codes.len()];
        };
        codes
            .iter()
            .map(|&code| record.key_mask().test(code as usize) || record.keymap.map_key(code).is_ok())
            .collect()
    }

    // --- Vibration and LEDs (§4.9) ---

    pub fn vibrate(&self, id: DeviceId, effect: FFEffectData) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state.manager.device_mut(id).ok_or_else(|| Error::NotFound(format!("device {id}")))?;
        record.vibrate(effect)
    }

    pub fn cancel_vibrate(&self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let record = state.manager.device_mut(id).ok_or_else(|| Error::NotFound(format!("device {id}")))?;
        record.cancel_vibrate()
    }

    pub fn set_led(&self, id: DeviceId, led: LedCode, on: bool) -> Result<()> {
        let state = self.state.lock().unwrap();
        let record = state.manager.device(id).ok_or_else(|| Error::NotFound(format!("device {id}")))?;
        record.set_led(led, on)
    }

    // --- Device control (§4.6) ---

    pub fn disable(&self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.manager.disable(id, &self.pump)
    }

    pub fn enable(&self, id: DeviceId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.manager.enable(id, self.opener.as_ref(), &self.pump)
    }

    pub fn request_reopen_all(&self) {
        let mut state = self.state.lock().unwrap();
        state.manager.request_reopen_all();
    }

    /// Human-readable dump of every device's identity, classes and live state (§6).
    pub fn dump(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        for record in state.manager.devices() {
            writeln!(
                sink,
                "{}: {} classes={} controller={:?} enabled={}",
                record.id,
                record.identifier.name,
                record.classes,
                record.controller_number,
                !record.is_disabled(),
            )?;
        }
        Ok(())
    }

    /// Drains queued frames for the touch-video device paired with `id` (§4.6, §6, scenario S6).
    pub fn get_video_frames(&self, id: DeviceId) -> Vec<crate::video::VideoFrame> {
        let mut state = self.state.lock().unwrap();
        state
            .manager
            .device_mut(id)
            .and_then(|r| r.paired_video.as_mut())
            .map(|v| v.drain_frames())
            .unwrap_or_default()
    }
}

/// The production [`DeviceOpener`]: opens real `/dev/input`/`/dev/v4l-touch` nodes and probes
/// them through the real evdev ioctls.
pub struct RealDeviceOpener;

impl DeviceOpener for RealDeviceOpener {
    fn open_input(&self, path: &Path) -> Result<crate::device_manager::OpenedInput> {
        use nix::fcntl::{open, OFlag};
        use nix::sys::stat::Mode;
        let fd = open(path, OFlag::O_RDWR | OFlag::O_NONBLOCK, Mode::empty()).map_err(|e| match e {
            nix::errno::Errno::EACCES => Error::PermissionDenied(path.display().to_string()),
            nix::errno::Errno::ENOENT => Error::NotFound(path.display().to_string()),
            other => Error::from(other),
        })?;
        let identifier = crate::device_record::read_identifier(fd)?;
        let probe = crate::capability_probe::probe(&FdCapabilitySource(fd), &identifier)?;
        Ok(crate::device_manager::OpenedInput { fd, identifier, probe })
    }

    fn open_video(&self, path: &Path) -> Result<crate::video::TouchVideoDevice> {
        use nix::fcntl::{open, OFlag};
        use nix::sys::stat::Mode;
        let fd = open(path, OFlag::O_RDONLY | OFlag::O_NONBLOCK, Mode::empty()).map_err(Error::from)?;
        let associated = associated_input_path(path);
        Ok(crate::video::TouchVideoDevice::new(path.to_path_buf(), fd, associated, 16))
    }

    fn list_input_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        list_dir(dir)
    }

    fn list_video_paths(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        list_dir(dir)
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    match std::fs::read_dir(dir) {
        Ok(entries) => Ok(entries.filter_map(|e| e.ok()).map(|e| e.path()).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(Error::from(e)),
    }
}

/// Resolves a `/dev/v4l-touchN` path to its paired `/dev/input/eventN` path by the shared minor
/// number convention. The exact sysfs mapping is host-specific (§9, open question); this hub
/// only commits to "same trailing integer" as its resolution policy and documents the choice.
fn associated_input_path(video_path: &Path) -> PathBuf {
    let name = video_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let suffix: String = name.chars().skip_while(|c| !c.is_ascii_digit()).collect();
    video_path
        .parent()
        .unwrap_or(Path::new("/dev/v4l-touch"))
        .parent()
        .unwrap_or(Path::new("/dev"))
        .join("input")
        .join(format!("event{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn associated_path_uses_trailing_minor_number() {
        let path = associated_input_path(Path::new("/dev/v4l-touch3"));
        assert_eq!(path, PathBuf::from("/dev/input/event3"));
    }

    #[test]
    fn get_events_with_zero_capacity_returns_immediately() {
        struct EmptyOpener;
        impl DeviceOpener for EmptyOpener {
            fn open_input(&self, _: &Path) -> Result<crate::device_manager::OpenedInput> {
                Err(Error::NotFound("none".into()))
            }
            fn open_video(&self, _: &Path) -> Result<crate::video::TouchVideoDevice> {
                Err(Error::NotFound("none".into()))
            }
            fn list_input_paths(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(vec![])
            }
            fn list_video_paths(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(vec![])
            }
        }
        let dir_in = tempfile::tempdir().unwrap();
        let dir_video = tempfile::tempdir().unwrap();
        let config = HubConfig {
            input_directory: dir_in.path().to_path_buf(),
            video_directory: dir_video.path().to_path_buf(),
            ..HubConfig::default()
        };
        let hub = EventHub::new(Box::new(EmptyOpener), config).unwrap();
        let events = hub.get_events(0, 0, 0).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_device_state_query_is_unknown() {
        struct EmptyOpener;
        impl DeviceOpener for EmptyOpener {
            fn open_input(&self, _: &Path) -> Result<crate::device_manager::OpenedInput> {
                Err(Error::NotFound("none".into()))
            }
            fn open_video(&self, _: &Path) -> Result<crate::video::TouchVideoDevice> {
                Err(Error::NotFound("none".into()))
            }
            fn list_input_paths(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(vec![])
            }
            fn list_video_paths(&self, _: &Path) -> Result<Vec<PathBuf>> {
                Ok(vec![])
            }
        }
        let dir_in = tempfile::tempdir().unwrap();
        let dir_video = tempfile::tempdir().unwrap();
        let config = HubConfig {
            input_directory: dir_in.path().to_path_buf(),
            video_directory: dir_video.path().to_path_buf(),
            ..HubConfig::default()
        };
        let hub = EventHub::new(Box::new(EmptyOpener), config).unwrap();
        assert_eq!(hub.get_key_code_state(42, 30), StateValue::Unknown);
    }
}
