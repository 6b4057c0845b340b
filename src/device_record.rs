//! Per-device state owned exclusively by the hub (§3, §4.6, §4.9).
//!
//! `DeviceRecord` is the one place the capability masks from `capability_probe`, the live-state
//! mirrors from `device_state`, the keymap from `keymap`, and the vibrator/LED bookkeeping all
//! come together for a single open device. Grounded on the reference crate's `Device`, which
//! plays the same aggregating role around one open fd.

use crate::bitmask::BitMask;
use crate::capability_probe::{CapabilitySource, ProbeResult};
use crate::compat::{input_absinfo, input_event, input_id};
use crate::config::DeviceConfig;
use crate::constants::*;
use crate::device_state::DeviceLiveState;
use crate::error::{Error, Result};
use crate::ff::FFEffectData;
use crate::keymap::LayeredKeyMap;
use crate::raw_event::{DeviceClassSet, DeviceId, InputDeviceIdentifier};
use crate::sys;
use crate::video::TouchVideoDevice;
use nix::unistd::{close, read};
use std::io;
use std::os::unix::io::{BorrowedFd, RawFd};
use std::path::PathBuf;

/// Where a device's kernel descriptor currently stands.
enum Descriptor {
    /// A real, currently open evdev fd.
    Open(RawFd),
    /// A real device that has been `disable`d: the record survives, the fd does not.
    Disabled,
    /// No kernel fd ever existed (the synthetic virtual keyboard).
    Virtual,
}

/// An effect id the hub has uploaded and is tracking (§4.9). `-1` means no effect is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct VibratorState {
    pub effect_id: i16,
    pub playing: bool,
}

impl VibratorState {
    pub fn none() -> Self {
        VibratorState { effect_id: -1, playing: false }
    }
}

pub struct DeviceRecord {
    pub id: DeviceId,
    pub identifier: InputDeviceIdentifier,
    pub path: PathBuf,
    pub controller_number: Option<u32>,
    pub enabled: bool,
    pub classes: DeviceClassSet,
    pub external: bool,

    event_mask: BitMask,
    key_mask: BitMask,
    rel_mask: BitMask,
    abs_mask: BitMask,
    sw_mask: BitMask,
    led_mask: BitMask,
    ff_mask: BitMask,
    prop_mask: BitMask,
    has_led: bool,

    pub live: DeviceLiveState,
    live_synced: bool,
    pub keymap: LayeredKeyMap,
    pub config: DeviceConfig,

    pub vibrator: VibratorState,
    pub paired_video: Option<TouchVideoDevice>,

    descriptor: Descriptor,
}

impl DeviceRecord {
    /// Assembles a record for a just-opened real device from the probe result and an already
    /// open, non-blocking fd.
    pub fn new_open(
        id: DeviceId,
        identifier: InputDeviceIdentifier,
        path: PathBuf,
        fd: RawFd,
        probe: ProbeResult,
        external: bool,
    ) -> Self {
        DeviceRecord {
            id,
            identifier,
            path,
            controller_number: None,
            enabled: true,
            classes: probe.classes,
            external,
            event_mask: probe.event_mask,
            key_mask: probe.key_mask,
            rel_mask: probe.rel_mask,
            abs_mask: probe.abs_mask,
            sw_mask: probe.sw_mask,
            led_mask: probe.led_mask,
            ff_mask: probe.ff_mask,
            prop_mask: probe.prop_mask,
            has_led: probe.has_led,
            live: DeviceLiveState::new(),
            live_synced: false,
            keymap: LayeredKeyMap::new(Default::default()),
            config: DeviceConfig::default(),
            vibrator: VibratorState::none(),
            paired_video: None,
            descriptor: Descriptor::Open(fd),
        }
    }

    /// Assembles a record for the synthetic always-present virtual keyboard (§3, §6).
    pub fn new_virtual(id: DeviceId, identifier: InputDeviceIdentifier) -> Self {
        let mut key_mask = BitMask::new(KEY_CNT);
        key_mask.set(KeyCode::BTN_MISC.0 as usize, true);
        let mut classes = DeviceClassSet::new();
        classes.insert(crate::raw_event::DeviceClass::Keyboard);
        classes.insert(crate::raw_event::DeviceClass::Virtual);

        DeviceRecord {
            id,
            identifier,
            path: PathBuf::new(),
            controller_number: None,
            enabled: true,
            classes,
            external: false,
            event_mask: BitMask::new(EV_CNT),
            key_mask,
            rel_mask: BitMask::new(REL_CNT),
            abs_mask: BitMask::new(ABS_CNT),
            sw_mask: BitMask::new(SW_CNT),
            led_mask: BitMask::new(LED_CNT),
            ff_mask: BitMask::new(FF_CNT),
            prop_mask: BitMask::new(INPUT_PROP_CNT),
            has_led: false,
            live: DeviceLiveState::new(),
            live_synced: true,
            keymap: LayeredKeyMap::new(Default::default()),
            config: DeviceConfig::default(),
            vibrator: VibratorState::none(),
            paired_video: None,
            descriptor: Descriptor::Virtual,
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self.descriptor, Descriptor::Virtual)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.descriptor, Descriptor::Disabled)
    }

    pub fn raw_fd(&self) -> Option<RawFd> {
        match self.descriptor {
            Descriptor::Open(fd) => Some(fd),
            _ => None,
        }
    }

    /// Closes the kernel fd without dropping the record (§4.6 `disable`).
    pub fn disable(&mut self) -> Result<()> {
        if self.is_virtual() {
            return Err(Error::Unsupported("virtual device cannot be disabled".into()));
        }
        match std::mem::replace(&mut self.descriptor, Descriptor::Disabled) {
            Descriptor::Open(fd) => {
                let _ = close(fd);
                self.enabled = false;
                Ok(())
            }
            other => {
                self.descriptor = other;
                Err(Error::AlreadyInState)
            }
        }
    }

    /// Reinstalls an fd reopened by the caller (§4.6 `enable`). The live-state mirror is stale
    /// after a reopen, so the next state query re-primes it from the kernel.
    pub fn enable_with_fd(&mut self, fd: RawFd) -> Result<()> {
        if !self.is_disabled() {
            return Err(Error::AlreadyInState);
        }
        self.descriptor = Descriptor::Open(fd);
        self.enabled = true;
        self.live_synced = false;
        Ok(())
    }

    pub fn key_mask(&self) -> &BitMask {
        &self.key_mask
    }
    pub fn abs_mask(&self) -> &BitMask {
        &self.abs_mask
    }
    pub fn sw_mask(&self) -> &BitMask {
        &self.sw_mask
    }
    pub fn led_mask(&self) -> &BitMask {
        &self.led_mask
    }
    pub fn ff_mask(&self) -> &BitMask {
        &self.ff_mask
    }
    pub fn has_led(&self) -> bool {
        self.has_led
    }

    /// Primes the live-state mirror straight from the kernel the first time a query touches a
    /// device after open or re-enable (§4.8: "prefer the cached mirror; on a miss they issue a
    /// direct ioctl"). Every code the mirror has never seen an event for is exactly that miss:
    /// without this, a switch or axis that is already non-default at open time (a lid switch
    /// already closed, a joystick resting off-center) reads as `Up`/`0` until its first event.
    /// A no-op on every call after the first, and on a virtual or disabled record.
    pub fn ensure_live_state_synced(&mut self) -> Result<()> {
        if self.live_synced {
            return Ok(());
        }
        let Some(fd) = self.raw_fd() else {
            return Ok(());
        };
        self.live.key_state = read_bit_buf(fd, KEY_CNT, sys::eviocgkey)?;
        self.live.sw_state = read_bit_buf(fd, SW_CNT, sys::eviocgsw)?;
        for code in 0..ABS_CNT {
            if self.abs_mask.test(code) {
                if let Ok(info) = read_abs_info(fd, AbsoluteAxisCode(code as u16)) {
                    self.live.abs_values[code] = info.value;
                }
            }
        }
        self.live_synced = true;
        Ok(())
    }

    /// Reads and decodes as many pending `input_event` records as are available, feeding each
    /// into the live-state mirrors as it goes (§4.7 step 4, device fd case).
    pub fn read_events(&mut self, out: &mut Vec<(i64, u16, u16, i32)>) -> Result<()> {
        let fd = self.raw_fd().ok_or_else(|| Error::Unsupported("device has no open fd".into()))?;
        let mut buf = [0u8; std::mem::size_of::<input_event>() * 32];
        loop {
            match read(fd, &mut buf) {
                Ok(0) => return Err(Error::IoError(io::Error::from(io::ErrorKind::UnexpectedEof))),
                Ok(n) => {
                    let count = n / std::mem::size_of::<input_event>();
                    for i in 0..count {
                        let start = i * std::mem::size_of::<input_event>();
                        let raw = decode_input_event(&buf[start..start + std::mem::size_of::<input_event>()]);
                        self.live.apply(raw.1, raw.2, raw.3);
                        out.push(raw);
                    }
                    if n < buf.len() {
                        return Ok(());
                    }
                }
                Err(nix::errno::Errno::EAGAIN) => return Ok(()),
                Err(e) => return Err(Error::from(e)),
            }
        }
    }

    /// Uploads `effect` via `EVIOCSFF`, canceling any effect already playing first (§4.9).
    pub fn vibrate(&mut self, effect: FFEffectData) -> Result<()> {
        if self.vibrator.playing {
            self.cancel_vibrate()?;
        }
        let fd = self.raw_fd().ok_or_else(|| Error::Unsupported("device has no open fd".into()))?;
        let mut raw: sys::ff_effect = effect.into();
        unsafe { sys::eviocsff(fd, &mut raw) }.map_err(Error::from)?;
        self.vibrator = VibratorState { effect_id: raw.id, playing: true };
        Ok(())
    }

    pub fn cancel_vibrate(&mut self) -> Result<()> {
        if !self.vibrator.playing {
            return Ok(());
        }
        if let Some(fd) = self.raw_fd() {
            let _ = unsafe { sys::eviocrmff(fd, self.vibrator.effect_id as u64) };
        }
        self.vibrator = VibratorState::none();
        Ok(())
    }

    pub fn supports_led(&self, led: LedCode) -> bool {
        self.led_mask.test(led.0 as usize)
    }

    /// Writes an `EV_LED` record to turn `led` on or off, no-op if unsupported (§4.9). The
    /// abstract LED code is translated to this device's scan code through `config.led_overrides`
    /// (keyed by the LED's debug name, e.g. `"LED_CAPSL"`); a device with no configured override
    /// for that LED uses the abstract code's numeric value directly.
    pub fn set_led(&self, led: LedCode, on: bool) -> Result<()> {
        if !self.supports_led(led) {
            return Ok(());
        }
        let fd = self.raw_fd().ok_or_else(|| Error::Unsupported("device has no open fd".into()))?;
        let scan_code = self.config.led_overrides.get(&format!("{led:?}")).copied().unwrap_or(led.0);
        write_input_event(fd, EventType::LED.0, scan_code, on as i32)
    }
}

fn write_input_event(fd: RawFd, type_: u16, code: u16, value: i32) -> Result<()> {
    use nix::unistd::write;
    let mut event: input_event = unsafe { std::mem::zeroed() };
    event.type_ = type_;
    event.code = code;
    event.value = value;
    let bytes = unsafe {
        std::slice::from_raw_parts(&event as *const input_event as *const u8, std::mem::size_of::<input_event>())
    };
    write(unsafe { BorrowedFd::borrow_raw(fd) }, bytes).map_err(Error::from)?;
    Ok(())
}

fn decode_input_event(bytes: &[u8]) -> (i64, u16, u16, i32) {
    // `struct input_event` is `{ timeval, u16 type, u16 code, i32 value }`; the timeval's exact
    // width is platform-dependent, so we read the trailing fixed-size fields from the end rather
    // than transmuting the whole struct.
    let len = bytes.len();
    let value = i32::from_ne_bytes(bytes[len - 4..len].try_into().unwrap());
    let code = u16::from_ne_bytes(bytes[len - 8..len - 6].try_into().unwrap());
    let type_ = u16::from_ne_bytes(bytes[len - 6..len - 4].try_into().unwrap());
    (0, type_, code, value)
}

/// Implements the capability-reading seam for a just-opened, still-unwrapped fd, before a
/// `DeviceRecord` exists (used by `device_manager::open_device`).
pub struct FdCapabilitySource(pub RawFd);

impl CapabilitySource for FdCapabilitySource {
    fn event_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, EV_CNT, sys::eviocgbit_type)
    }
    fn key_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, KEY_CNT, sys::eviocgbit_key)
    }
    fn rel_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, REL_CNT, sys::eviocgbit_relative)
    }
    fn abs_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, ABS_CNT, sys::eviocgbit_absolute)
    }
    fn sw_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, SW_CNT, sys::eviocgbit_switch)
    }
    fn led_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, LED_CNT, sys::eviocgbit_led)
    }
    fn ff_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, FF_CNT, sys::eviocgbit_ff)
    }
    fn prop_bits(&self) -> Result<BitMask> {
        read_bit_buf(self.0, INPUT_PROP_CNT, sys::eviocgprop)
    }
}

type RawBufIoctl = unsafe fn(RawFd, &mut [u8]) -> nix::Result<libc::c_int>;

fn read_bit_buf(fd: RawFd, width: usize, ioctl: RawBufIoctl) -> Result<BitMask> {
    let mut buf = vec![0u8; width.div_ceil(8)];
    unsafe { ioctl(fd, &mut buf) }.map_err(Error::from)?;
    let mut mask = BitMask::new(width);
    mask.load_from_bytes(&buf);
    Ok(mask)
}

/// Reads the static identity fields via `EVIOCGID`/`EVIOCGNAME`/`EVIOCGPHYS`/`EVIOCGUNIQ`.
pub fn read_identifier(fd: RawFd) -> Result<InputDeviceIdentifier> {
    let mut id: input_id = unsafe { std::mem::zeroed() };
    unsafe { sys::eviocgid(fd, &mut id) }.map_err(Error::from)?;
    let name = read_string_ioctl(fd, sys::eviocgname)?;
    let location = read_string_ioctl(fd, sys::eviocgphys).unwrap_or_default();
    let unique_id = read_string_ioctl(fd, sys::eviocguniq).unwrap_or_default();

    let descriptor = InputDeviceIdentifier::derive_descriptor(
        id.bustype,
        id.vendor,
        id.product,
        id.version,
        &unique_id,
        &name,
    );

    Ok(InputDeviceIdentifier {
        name,
        location,
        unique_id,
        bus: id.bustype,
        vendor: id.vendor,
        product: id.product,
        version: id.version,
        descriptor,
    })
}

fn read_string_ioctl(fd: RawFd, ioctl: RawBufIoctl) -> Result<String> {
    let mut buf = vec![0u8; 256];
    let n = unsafe { ioctl(fd, &mut buf) }.map_err(Error::from)?;
    let n = (n.max(0) as usize).saturating_sub(1).min(buf.len());
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

/// Reads the absolute-axis limits for `axis` via `EVIOCGABS` (used on a state-query cache miss).
pub fn read_abs_info(fd: RawFd, axis: AbsoluteAxisCode) -> Result<input_absinfo> {
    let mut info: input_absinfo = unsafe { std::mem::zeroed() };
    unsafe { sys::eviocgabs(fd, axis.0 as u32, &mut info) }.map_err(Error::from)?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_record_has_no_fd_and_is_immediately_usable() {
        let record = DeviceRecord::new_virtual(
            crate::raw_event::VIRTUAL_KEYBOARD_ID,
            InputDeviceIdentifier {
                name: "Virtual Keyboard".into(),
                location: "".into(),
                unique_id: "".into(),
                bus: 0,
                vendor: 0,
                product: 0,
                version: 0,
                descriptor: "virtual-keyboard".into(),
            },
        );
        assert!(record.is_virtual());
        assert!(record.raw_fd().is_none());
        assert!(record.classes.contains(crate::raw_event::DeviceClass::Keyboard));
    }

    #[test]
    fn ensure_live_state_synced_is_a_no_op_on_a_virtual_record() {
        let mut record = DeviceRecord::new_virtual(
            crate::raw_event::VIRTUAL_KEYBOARD_ID,
            InputDeviceIdentifier {
                name: "Virtual Keyboard".into(),
                location: "".into(),
                unique_id: "".into(),
                bus: 0,
                vendor: 0,
                product: 0,
                version: 0,
                descriptor: "virtual-keyboard".into(),
            },
        );
        assert!(record.ensure_live_state_synced().is_ok());
    }

    #[test]
    fn set_led_translates_through_a_configured_override() {
        use crate::capability_probe::ProbeResult;
        let mut led_mask = BitMask::new(LED_CNT);
        led_mask.set(LedCode::LED_CAPSL.0 as usize, true);
        let (read_fd, write_fd) = nix::unistd::pipe().unwrap();
        use std::os::unix::io::IntoRawFd;
        let read_fd = read_fd.into_raw_fd();
        let fd = write_fd.into_raw_fd();

        let mut record = DeviceRecord::new_open(
            1,
            InputDeviceIdentifier {
                name: "pad".into(),
                location: "".into(),
                unique_id: "".into(),
                bus: 0,
                vendor: 0,
                product: 0,
                version: 0,
                descriptor: "pad".into(),
            },
            PathBuf::new(),
            fd,
            ProbeResult {
                classes: Default::default(),
                event_mask: BitMask::new(EV_CNT),
                key_mask: BitMask::new(KEY_CNT),
                rel_mask: BitMask::new(REL_CNT),
                abs_mask: BitMask::new(ABS_CNT),
                sw_mask: BitMask::new(SW_CNT),
                led_mask,
                ff_mask: BitMask::new(FF_CNT),
                prop_mask: BitMask::new(INPUT_PROP_CNT),
                has_led: true,
            },
            false,
        );
        record.config.led_overrides.insert("LED_CAPSL".to_string(), 77);
        assert!(record.set_led(LedCode::LED_CAPSL, true).is_ok());
        assert!(!record.supports_led(LedCode::LED_NUML));

        let mut buf = [0u8; std::mem::size_of::<input_event>()];
        assert_eq!(read(read_fd, &mut buf).unwrap(), buf.len());
        let (_, _, code, value) = decode_input_event(&buf);
        assert_eq!(code, 77);
        assert_eq!(value, 1);
        let _ = close(fd);
        let _ = close(read_fd);
    }

    #[test]
    fn disabling_a_virtual_device_is_unsupported() {
        let mut record = DeviceRecord::new_virtual(
            crate::raw_event::VIRTUAL_KEYBOARD_ID,
            InputDeviceIdentifier {
                name: "Virtual Keyboard".into(),
                location: "".into(),
                unique_id: "".into(),
                bus: 0,
                vendor: 0,
                product: 0,
                version: 0,
                descriptor: "virtual-keyboard".into(),
            },
        );
        assert!(record.disable().is_err());
    }
}
