//! Opens/closes devices, assigns ids and descriptors, and keeps the device/video registries in
//! sync (§4.6).
//!
//! The "open a device" seam is abstracted behind [`DeviceOpener`] so device discovery can be
//! exercised without a real `/dev/input` tree (§9, virtual polymorphism) — one production
//! implementation drives real syscalls, one test double hands back canned descriptors.

use crate::capability_probe::ProbeResult;
use crate::config::{DeviceConfig, HubConfig};
use crate::controller_pool::ControllerNumberPool;
use crate::device_record::DeviceRecord;
use crate::epoll_pump::EpollPump;
use crate::error::{Error, Result};
use crate::keymap::{KeyMapLoader, LayeredKeyMap, UnimplementedKeyCharacterMapParser};
use crate::raw_event::{
    DeviceClass, DeviceId, InputDeviceIdentifier, RawEvent, BUILTIN_KEYBOARD_EXTERNAL_ID,
    DEVICE_ADDED, DEVICE_REMOVED,
};
use crate::video::{TouchVideoDevice, VideoDeviceRegistry};
use nix::unistd::close;
use std::collections::HashMap;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

/// What `open_input` produced: an open, non-blocking fd plus everything the capability probe
/// already read from it.
pub struct OpenedInput {
    pub fd: RawFd,
    pub identifier: InputDeviceIdentifier,
    pub probe: ProbeResult,
}

/// The "open a device" seam (§9). One implementation drives real evdev ioctls; tests supply a
/// table of canned devices keyed by path.
pub trait DeviceOpener {
    fn open_input(&self, path: &Path) -> Result<OpenedInput>;
    fn open_video(&self, path: &Path) -> Result<TouchVideoDevice>;
    fn list_input_paths(&self, dir: &Path) -> Result<Vec<PathBuf>>;
    fn list_video_paths(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

pub struct DeviceManager {
    devices: HashMap<DeviceId, DeviceRecord>,
    path_to_id: HashMap<PathBuf, DeviceId>,
    next_id: DeviceId,
    controller_pool: ControllerNumberPool,
    video_registry: VideoDeviceRegistry,
    builtin_keyboard_id: Option<DeviceId>,
    pending_scan: bool,
    pending_reopen: bool,
}

impl DeviceManager {
    pub fn new() -> Self {
        DeviceManager {
            devices: HashMap::new(),
            path_to_id: HashMap::new(),
            next_id: 1,
            controller_pool: ControllerNumberPool::new(),
            video_registry: VideoDeviceRegistry::new(),
            builtin_keyboard_id: None,
            pending_scan: true,
            pending_reopen: false,
        }
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn device(&self, id: DeviceId) -> Option<&DeviceRecord> {
        self.devices.get(&self.internal_id(id))
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut DeviceRecord> {
        let internal = self.internal_id(id);
        self.devices.get_mut(&internal)
    }

    /// Maps an externally visible id back to the internal id, undoing the built-in keyboard's
    /// alias to 0.
    fn internal_id(&self, external: DeviceId) -> DeviceId {
        if external == BUILTIN_KEYBOARD_EXTERNAL_ID {
            self.builtin_keyboard_id.unwrap_or(BUILTIN_KEYBOARD_EXTERNAL_ID)
        } else {
            external
        }
    }

    fn external_id(&self, internal: DeviceId) -> DeviceId {
        if Some(internal) == self.builtin_keyboard_id {
            BUILTIN_KEYBOARD_EXTERNAL_ID
        } else {
            internal
        }
    }

    /// Installs the synthetic always-present virtual keyboard (§3, §6) at the reserved id
    /// `VIRTUAL_KEYBOARD_ID`. Idempotent: a second call is a no-op.
    pub fn insert_virtual_keyboard(&mut self) {
        use crate::raw_event::VIRTUAL_KEYBOARD_ID;
        if self.devices.contains_key(&VIRTUAL_KEYBOARD_ID) {
            return;
        }
        let identifier = InputDeviceIdentifier {
            name: "Virtual Keyboard".to_string(),
            location: String::new(),
            unique_id: String::new(),
            bus: 0,
            vendor: 0,
            product: 0,
            version: 0,
            descriptor: "virtual-keyboard".to_string(),
        };
        let record = DeviceRecord::new_virtual(VIRTUAL_KEYBOARD_ID, identifier);
        self.devices.insert(VIRTUAL_KEYBOARD_ID, record);
    }

    pub fn request_reopen_all(&mut self) {
        self.pending_reopen = true;
    }

    pub fn take_pending_reopen(&mut self) -> bool {
        std::mem::take(&mut self.pending_reopen)
    }

    pub fn take_pending_scan(&mut self) -> bool {
        std::mem::take(&mut self.pending_scan)
    }

    pub fn request_scan(&mut self) {
        self.pending_scan = true;
    }

    fn uniquify_descriptor(&self, base: &str) -> String {
        let taken: std::collections::HashSet<&str> =
            self.devices.values().map(|d| d.identifier.descriptor.as_str()).collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}#{n}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Opens every non-excluded entry under `config`'s input and video directories, queuing a
    /// `DEVICE_ADDED` for each and terminating the returned batch with one
    /// `FINISHED_DEVICE_SCAN` (§4.6 `scan_all`).
    pub fn scan_all(
        &mut self,
        opener: &dyn DeviceOpener,
        pump: &EpollPump,
        config: &HubConfig,
        now_ns: i64,
        out: &mut Vec<RawEvent>,
    ) -> Result<()> {
        for path in opener.list_input_paths(&config.input_directory)? {
            if config.is_excluded(&path) {
                continue;
            }
            self.open_device(&path, opener, pump, config, now_ns, out)?;
        }
        for path in opener.list_video_paths(&config.video_directory)? {
            if config.is_excluded(&path) {
                continue;
            }
            self.open_video_device(&path, opener, pump)?;
        }
        out.push(RawEvent::synthetic(now_ns, 0, crate::raw_event::FINISHED_DEVICE_SCAN));
        Ok(())
    }

    /// Opens one input device, probes it, installs the record, and queues its `DEVICE_ADDED`.
    pub fn open_device(
        &mut self,
        path: &Path,
        opener: &dyn DeviceOpener,
        pump: &EpollPump,
        config: &HubConfig,
        now_ns: i64,
        out: &mut Vec<RawEvent>,
    ) -> Result<()> {
        if self.path_to_id.contains_key(path) {
            return Ok(());
        }
        let OpenedInput { fd, mut identifier, probe } = opener.open_input(path)?;
        identifier.descriptor = self.uniquify_descriptor(&identifier.descriptor);

        let id = self.next_id;
        self.next_id += 1;

        let external = probe.classes.contains(DeviceClass::External);
        let is_gamepad = probe.classes.contains(DeviceClass::Gamepad);

        pump.register_fd(fd)?;

        let mut record = DeviceRecord::new_open(id, identifier, path.to_path_buf(), fd, probe, external);

        // §4.3 rule 7: a file-backed per-device config, keyed by descriptor, is loaded and
        // attached here so `set_led` and the keymap loader below can consult its overrides.
        let device_config = DeviceConfig::load_for_descriptor(&config.device_config_directory, &record.identifier.descriptor);
        let loader = KeyMapLoader::new(&UnimplementedKeyCharacterMapParser, vec![config.keymap_directory.clone()]);
        let base = loader.load_base(&record.identifier.descriptor, device_config.keymap_path.as_deref());
        record.keymap = LayeredKeyMap::new(base);
        record.config = device_config;

        if is_gamepad {
            let number = self.controller_pool.acquire();
            if number == 0 {
                pump.unregister_fd(fd)?;
                let _ = close(fd);
                return Err(Error::Exhausted);
            }
            record.controller_number = Some(number);
        }

        if record.classes.contains(DeviceClass::Keyboard) && !external && self.builtin_keyboard_id.is_none() {
            self.builtin_keyboard_id = Some(id);
        }

        if record.classes.contains(DeviceClass::Touch) {
            if let Some(video) = self.video_registry.take_matching(path) {
                record.paired_video = Some(video);
            }
        }

        self.path_to_id.insert(path.to_path_buf(), id);
        self.devices.insert(id, record);

        out.push(RawEvent::synthetic(now_ns, self.external_id(id), DEVICE_ADDED));
        Ok(())
    }

    /// Opens a touch-video descriptor, registers its fd with the pump so it can produce a
    /// `WakeSource::Device` readiness event of its own (§4.7 step 4), and pairs it with its input
    /// device if already open, otherwise parks it in the unattached registry (§4.6 pairing,
    /// scenario S6).
    pub fn open_video_device(&mut self, path: &Path, opener: &dyn DeviceOpener, pump: &EpollPump) -> Result<()> {
        let video = opener.open_video(path)?;
        pump.register_fd(video.fd)?;
        if let Some(&input_id) = self.path_to_id.get(&video.associated_input_path) {
            if let Some(record) = self.devices.get_mut(&input_id) {
                if record.classes.contains(DeviceClass::Touch) && record.paired_video.is_none() {
                    record.paired_video = Some(video);
                    return Ok(());
                }
            }
        }
        self.video_registry.insert_unattached(video);
        Ok(())
    }

    /// Looks up a touch-video descriptor by raw fd, whether already paired to a device or still
    /// sitting unattached (§4.7 step 4, video-fd dispatch).
    pub fn video_device_mut(&mut self, fd: RawFd) -> Option<&mut TouchVideoDevice> {
        for record in self.devices.values_mut() {
            if let Some(video) = record.paired_video.as_mut() {
                if video.fd == fd {
                    return Some(video);
                }
            }
        }
        self.video_registry.find_by_fd_mut(fd)
    }

    /// Closes by path; a no-op if nothing is open there (§4.6, idempotence).
    pub fn close_by_path(&mut self, path: &Path, pump: &EpollPump, now_ns: i64, out: &mut Vec<RawEvent>) -> Result<()> {
        if let Some(&id) = self.path_to_id.get(path) {
            self.close(id, pump, now_ns, out)
        } else {
            Ok(())
        }
    }

    /// Closes a device by internal id, releasing its controller number and detaching any paired
    /// video device back to the unattached registry (§4.6, §3 invariant). Idempotent.
    pub fn close(&mut self, id: DeviceId, pump: &EpollPump, now_ns: i64, out: &mut Vec<RawEvent>) -> Result<()> {
        let Some(mut record) = self.devices.remove(&id) else {
            return Ok(());
        };
        self.path_to_id.remove(&record.path);

        if let Some(fd) = record.raw_fd() {
            pump.unregister_fd(fd)?;
            let _ = close(fd);
        }
        if let Some(number) = record.controller_number.take() {
            if !self.controller_pool.release(number) {
                log::warn!("controller number {number} was already released");
            }
        }
        if let Some(video) = record.paired_video.take() {
            self.video_registry.return_unattached(video);
        }
        if self.builtin_keyboard_id == Some(id) {
            self.builtin_keyboard_id = None;
        }

        out.push(RawEvent::synthetic(now_ns, self.external_id(id), DEVICE_REMOVED));
        Ok(())
    }

    /// Closes every open device and schedules a fresh scan for the next event-loop turn (§4.6
    /// `request_reopen_all`, consumed via `take_pending_reopen`).
    pub fn close_all_for_reopen(&mut self, pump: &EpollPump, now_ns: i64, out: &mut Vec<RawEvent>) -> Result<()> {
        let ids: Vec<DeviceId> = self.devices.keys().copied().collect();
        for id in ids {
            self.close(id, pump, now_ns, out)?;
        }
        self.pending_scan = true;
        Ok(())
    }

    /// Disables a device, closing its fd without dropping the record (§4.6 `enable`/`disable`).
    pub fn disable(&mut self, id: DeviceId, pump: &EpollPump) -> Result<()> {
        let internal = self.internal_id(id);
        let record = self.devices.get_mut(&internal).ok_or_else(|| Error::NotFound(format!("device {id}")))?;
        if let Some(fd) = record.raw_fd() {
            pump.unregister_fd(fd)?;
        }
        record.disable()
    }

    /// Re-opens a previously disabled device's fd and re-registers it with epoll, preserving its
    /// id, descriptor, and cached capability masks.
    pub fn enable(&mut self, id: DeviceId, opener: &dyn DeviceOpener, pump: &EpollPump) -> Result<()> {
        let internal = self.internal_id(id);
        let record = self.devices.get_mut(&internal).ok_or_else(|| Error::NotFound(format!("device {id}")))?;
        if !record.is_disabled() {
            return Err(Error::AlreadyInState);
        }
        let opened = opener.open_input(&record.path)?;
        pump.register_fd(opened.fd)?;
        record.enable_with_fd(opened.fd)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmask::BitMask;
    use crate::constants::*;
    use std::os::unix::io::IntoRawFd;
    use std::sync::Mutex;

    struct FakeOpener {
        inputs: Mutex<HashMap<PathBuf, (InputDeviceIdentifier, Vec<DeviceClass>)>>,
        videos: Mutex<HashMap<PathBuf, PathBuf>>,
    }

    /// Hands back a real pipe fd standing in for an opened device, so the rest of the code can
    /// register/close it with epoll exactly as it would a real evdev fd.
    fn fake_device_fd() -> RawFd {
        let (read_fd, write_fd) = nix::unistd::pipe().unwrap();
        std::mem::forget(write_fd);
        read_fd.into_raw_fd()
    }

    impl FakeOpener {
        fn new() -> Self {
            FakeOpener {
                inputs: Mutex::new(HashMap::new()),
                videos: Mutex::new(HashMap::new()),
            }
        }

        fn add_input(&self, path: &str, name: &str, classes: Vec<DeviceClass>) {
            self.inputs.lock().unwrap().insert(
                PathBuf::from(path),
                (
                    InputDeviceIdentifier {
                        name: name.to_string(),
                        location: String::new(),
                        unique_id: String::new(),
                        bus: 0x03,
                        vendor: 1,
                        product: 1,
                        version: 1,
                        descriptor: name.to_string(),
                    },
                    classes,
                ),
            );
        }

        fn add_video(&self, path: &str, associated_input: &str) {
            self.videos.lock().unwrap().insert(PathBuf::from(path), PathBuf::from(associated_input));
        }
    }

    impl DeviceOpener for FakeOpener {
        fn open_input(&self, path: &Path) -> Result<OpenedInput> {
            let inputs = self.inputs.lock().unwrap();
            let (identifier, classes) = inputs
                .get(path)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("{path:?}")))?;
            let fd = fake_device_fd();

            let mut class_set = crate::raw_event::DeviceClassSet::new();
            for c in classes {
                class_set.insert(c);
            }
            Ok(OpenedInput {
                fd,
                identifier,
                probe: ProbeResult {
                    classes: class_set,
                    event_mask: BitMask::new(EV_CNT),
                    key_mask: BitMask::new(KEY_CNT),
                    rel_mask: BitMask::new(REL_CNT),
                    abs_mask: BitMask::new(ABS_CNT),
                    sw_mask: BitMask::new(SW_CNT),
                    led_mask: BitMask::new(LED_CNT),
                    ff_mask: BitMask::new(FF_CNT),
                    prop_mask: BitMask::new(INPUT_PROP_CNT),
                    has_led: false,
                },
            })
        }

        fn open_video(&self, path: &Path) -> Result<TouchVideoDevice> {
            let videos = self.videos.lock().unwrap();
            let associated = videos.get(path).cloned().ok_or_else(|| Error::NotFound(format!("{path:?}")))?;
            let fd = fake_device_fd();
            Ok(TouchVideoDevice::new(path.to_path_buf(), fd, associated, 8))
        }

        fn list_input_paths(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
            Ok(self.inputs.lock().unwrap().keys().cloned().collect())
        }

        fn list_video_paths(&self, _dir: &Path) -> Result<Vec<PathBuf>> {
            Ok(self.videos.lock().unwrap().keys().cloned().collect())
        }
    }

    fn test_pump() -> EpollPump {
        let dir_in = tempfile::tempdir().unwrap();
        let dir_video = tempfile::tempdir().unwrap();
        EpollPump::new(dir_in.path(), dir_video.path()).unwrap()
    }

    #[test]
    fn open_device_queues_device_added() {
        let opener = FakeOpener::new();
        opener.add_input("/dev/input/event0", "kbd", vec![DeviceClass::Keyboard, DeviceClass::AlphaKey]);
        let pump = test_pump();
        let config = HubConfig::default();
        let mut manager = DeviceManager::new();
        let mut out = Vec::new();
        manager.open_device(Path::new("/dev/input/event0"), &opener, &pump, &config, 0, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].event_type, DEVICE_ADDED);
        // first internal keyboard opened becomes the builtin keyboard, remapped to external id 0
        assert_eq!(out[0].device_id, BUILTIN_KEYBOARD_EXTERNAL_ID);
    }

    #[test]
    fn closing_twice_is_a_no_op() {
        let opener = FakeOpener::new();
        opener.add_input("/dev/input/event0", "kbd", vec![DeviceClass::Keyboard]);
        let pump = test_pump();
        let config = HubConfig::default();
        let mut manager = DeviceManager::new();
        let mut out = Vec::new();
        manager.open_device(Path::new("/dev/input/event0"), &opener, &pump, &config, 0, &mut out).unwrap();
        let id = manager.device(0).unwrap().id;
        out.clear();
        manager.close(id, &pump, 0, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        out.clear();
        manager.close(id, &pump, 0, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn controller_numbers_recycle_across_gamepads() {
        let opener = FakeOpener::new();
        opener.add_input("/dev/input/event0", "pad0", vec![DeviceClass::Gamepad]);
        opener.add_input("/dev/input/event1", "pad1", vec![DeviceClass::Gamepad]);
        opener.add_input("/dev/input/event2", "pad2", vec![DeviceClass::Gamepad]);
        let pump = test_pump();
        let config = HubConfig::default();
        let mut manager = DeviceManager::new();
        let mut out = Vec::new();
        manager.open_device(Path::new("/dev/input/event0"), &opener, &pump, &config, 0, &mut out).unwrap();
        manager.open_device(Path::new("/dev/input/event1"), &opener, &pump, &config, 0, &mut out).unwrap();
        let first_id = manager.path_to_id[Path::new("/dev/input/event0")];
        assert_eq!(manager.device(first_id).unwrap().controller_number, Some(1));
        manager.close(first_id, &pump, 0, &mut out).unwrap();
        manager.open_device(Path::new("/dev/input/event2"), &opener, &pump, &config, 0, &mut out).unwrap();
        let third_id = manager.path_to_id[Path::new("/dev/input/event2")];
        assert_eq!(manager.device(third_id).unwrap().controller_number, Some(1));
    }

    #[test]
    fn virtual_keyboard_is_reachable_at_its_reserved_id_and_idempotent() {
        let mut manager = DeviceManager::new();
        manager.insert_virtual_keyboard();
        manager.insert_virtual_keyboard();
        let record = manager.device(crate::raw_event::VIRTUAL_KEYBOARD_ID).unwrap();
        assert!(record.is_virtual());
        assert_eq!(manager.devices().filter(|d| d.is_virtual()).count(), 1);
    }

    #[test]
    fn video_device_pairs_with_already_open_touchscreen() {
        let opener = FakeOpener::new();
        opener.add_input("/dev/input/event0", "touch", vec![DeviceClass::Touch]);
        opener.add_video("/dev/v4l-touch0", "/dev/input/event0");
        let pump = test_pump();
        let config = HubConfig::default();
        let mut manager = DeviceManager::new();
        let mut out = Vec::new();
        manager.open_device(Path::new("/dev/input/event0"), &opener, &pump, &config, 0, &mut out).unwrap();
        let id = manager.path_to_id[Path::new("/dev/input/event0")];
        manager.open_video_device(Path::new("/dev/v4l-touch0"), &opener, &pump).unwrap();
        assert!(manager.device(id).unwrap().paired_video.is_some());
        assert!(manager.video_registry.is_empty());
    }

    #[test]
    fn video_device_mut_finds_an_unattached_video_by_fd() {
        let opener = FakeOpener::new();
        opener.add_video("/dev/v4l-touch0", "/dev/input/event0");
        let pump = test_pump();
        let mut manager = DeviceManager::new();
        manager.open_video_device(Path::new("/dev/v4l-touch0"), &opener, &pump).unwrap();
        let fd = manager.video_registry.unattached[0].fd;
        assert!(manager.video_device_mut(fd).is_some());
        assert!(manager.video_device_mut(fd + 1000).is_none());
    }
}
