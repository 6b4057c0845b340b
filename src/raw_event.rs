//! Identifiers and the event types that cross the hub/consumer boundary.
//!
//! `RawEvent` carries both genuine evdev records (decoded by [`crate::device_record`]) and the
//! synthetic lifecycle events ([`SyntheticEventType`]) the event loop interleaves with them. The
//! synthetic codes live in a reserved range above any real evdev `EventType` so a consumer can
//! never mistake one for kernel traffic.

use crate::compat::input_absinfo;
use std::fmt;

/// Stable small integer naming a device for the lifetime of its open/close cycle.
///
/// `0` is reserved as the externally visible alias for the built-in keyboard; `-1` names the
/// synthetic virtual keyboard; `-2` means "no built-in keyboard is currently known". No live
/// device record is ever assigned internal id `0`.
pub type DeviceId = i32;

pub const BUILTIN_KEYBOARD_EXTERNAL_ID: DeviceId = 0;
pub const VIRTUAL_KEYBOARD_ID: DeviceId = -1;
pub const NO_BUILTIN_KEYBOARD: DeviceId = -2;

/// Event types reserved for hub-synthesized lifecycle notifications, chosen well above
/// [`crate::constants::EV_MAX`] so they can never collide with a genuine evdev type.
pub const SYNTHETIC_EVENT_BASE: u16 = 0x8000;
pub const DEVICE_ADDED: u16 = SYNTHETIC_EVENT_BASE;
pub const DEVICE_REMOVED: u16 = SYNTHETIC_EVENT_BASE + 1;
pub const FINISHED_DEVICE_SCAN: u16 = SYNTHETIC_EVENT_BASE + 2;

/// One record handed to the consumer by `get_events`: either a decoded evdev record or one of
/// the synthetic lifecycle markers above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub timestamp_ns: i64,
    pub device_id: DeviceId,
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn synthetic(timestamp_ns: i64, device_id: DeviceId, event_type: u16) -> Self {
        RawEvent {
            timestamp_ns,
            device_id,
            event_type,
            code: 0,
            value: 0,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.event_type >= SYNTHETIC_EVENT_BASE
    }
}

/// Static identity of a device, read once at open time via `EVIOCGID`/`EVIOCGNAME`/etc.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDeviceIdentifier {
    pub name: String,
    pub location: String,
    pub unique_id: String,
    pub bus: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    /// Content-derived stable string recognizing a physical device across reconnects.
    pub descriptor: String,
}

impl InputDeviceIdentifier {
    /// Builds the content-derived descriptor from the fields that identify the same physical
    /// device across a reconnect: bus/vendor/product/version plus the unique id when the kernel
    /// supplied one, else the name. Collisions across distinct devices sharing one descriptor are
    /// resolved by the caller, which suffixes a counter.
    pub fn derive_descriptor(
        bus: u16,
        vendor: u16,
        product: u16,
        version: u16,
        unique_id: &str,
        name: &str,
    ) -> String {
        let fallback = if unique_id.is_empty() { name } else { unique_id };
        format!("{bus:04x}:{vendor:04x}:{product:04x}:{version:04x}:{fallback}")
    }
}

/// Absolute axis limits, zero-initialised when the axis is unsupported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawAbsoluteAxisInfo {
    pub valid: bool,
    pub min: i32,
    pub max: i32,
    pub flat: i32,
    pub fuzz: i32,
    pub resolution: i32,
}

impl From<input_absinfo> for RawAbsoluteAxisInfo {
    fn from(info: input_absinfo) -> Self {
        RawAbsoluteAxisInfo {
            valid: true,
            min: info.minimum,
            max: info.maximum,
            flat: info.flat,
            fuzz: info.fuzz,
            resolution: info.resolution,
        }
    }
}

/// Additive capability classes a device can carry (§4.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceClass {
    Keyboard,
    AlphaKey,
    Touch,
    TouchMt,
    Cursor,
    Dpad,
    Gamepad,
    Switch,
    Joystick,
    Vibrator,
    Mic,
    ExternalStylus,
    RotaryEncoder,
    Virtual,
    External,
}

/// A bitset-backed collection of [`DeviceClass`] values; small and cheap to copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceClassSet(u32);

impl DeviceClassSet {
    pub fn new() -> Self {
        DeviceClassSet(0)
    }

    pub fn insert(&mut self, class: DeviceClass) {
        self.0 |= 1 << class as u8;
    }

    pub fn contains(&self, class: DeviceClass) -> bool {
        self.0 & (1 << class as u8) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = DeviceClass> + '_ {
        const ALL: [DeviceClass; 15] = [
            DeviceClass::Keyboard,
            DeviceClass::AlphaKey,
            DeviceClass::Touch,
            DeviceClass::TouchMt,
            DeviceClass::Cursor,
            DeviceClass::Dpad,
            DeviceClass::Gamepad,
            DeviceClass::Switch,
            DeviceClass::Joystick,
            DeviceClass::Vibrator,
            DeviceClass::Mic,
            DeviceClass::ExternalStylus,
            DeviceClass::RotaryEncoder,
            DeviceClass::Virtual,
            DeviceClass::External,
        ];
        ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl fmt::Display for DeviceClassSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_set_implies_nothing_automatically() {
        // Implications (Dpad => Keyboard, Gamepad => Keyboard, Joystick => Gamepad) are the
        // probe's job, not this container's; a bare set only reflects what was inserted.
        let mut set = DeviceClassSet::new();
        set.insert(DeviceClass::Dpad);
        assert!(set.contains(DeviceClass::Dpad));
        assert!(!set.contains(DeviceClass::Keyboard));
    }

    #[test]
    fn descriptor_prefers_unique_id_over_name() {
        let d = InputDeviceIdentifier::derive_descriptor(0x03, 0x046d, 0xc52b, 1, "abc123", "Logitech Receiver");
        assert_eq!(d, "0003:046d:c52b:0001:abc123");
        let d = InputDeviceIdentifier::derive_descriptor(0x03, 0x046d, 0xc52b, 1, "", "Logitech Receiver");
        assert_eq!(d, "0003:046d:c52b:0001:Logitech Receiver");
    }

    #[test]
    fn synthetic_event_type_is_out_of_evdev_range() {
        let ev = RawEvent::synthetic(0, 1, DEVICE_ADDED);
        assert!(ev.is_synthetic());
        assert!(DEVICE_ADDED > crate::constants::EV_MAX);
    }
}
