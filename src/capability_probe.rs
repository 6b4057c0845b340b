//! Classifies a freshly opened device into [`DeviceClass`]es from its capability bitmasks (§4.3).
//!
//! Grounded on the reference crate's capability-reading methods (`Device::supported_keys`,
//! `supported_absolute_axes`, ...), which load one [`BitMask`] per evdev domain from
//! `EVIOCGBIT`/`EVIOCGPROP`; this module takes those masks (already loaded behind the
//! [`CapabilitySource`] seam so it can be probed against a real fd or a test double) and turns
//! them into the classification the hub actually needs.

use crate::bitmask::BitMask;
use crate::constants::*;
use crate::error::Result;
use crate::inputid::EXTERNAL_BUSES;
use crate::raw_event::{DeviceClass, DeviceClassSet, InputDeviceIdentifier};

/// The capability bitmasks for one device, as read from the kernel (or a test double).
///
/// Implemented for an open device descriptor by `device_record`; kept as a trait so probing can
/// be exercised without a real `/dev/input` node (§9, virtual polymorphism).
pub trait CapabilitySource {
    fn event_bits(&self) -> Result<BitMask>;
    fn key_bits(&self) -> Result<BitMask>;
    fn rel_bits(&self) -> Result<BitMask>;
    fn abs_bits(&self) -> Result<BitMask>;
    fn sw_bits(&self) -> Result<BitMask>;
    fn led_bits(&self) -> Result<BitMask>;
    fn ff_bits(&self) -> Result<BitMask>;
    fn prop_bits(&self) -> Result<BitMask>;
}

/// Everything the probe produces: the derived class set plus the raw masks, which the caller
/// stores on the `DeviceRecord` for later state queries.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub classes: DeviceClassSet,
    pub event_mask: BitMask,
    pub key_mask: BitMask,
    pub rel_mask: BitMask,
    pub abs_mask: BitMask,
    pub sw_mask: BitMask,
    pub led_mask: BitMask,
    pub ff_mask: BitMask,
    pub prop_mask: BitMask,
    pub has_led: bool,
}

/// Loads every capability mask from `source` and classifies the device (§4.3, rules 1-6).
pub fn probe(source: &dyn CapabilitySource, id: &InputDeviceIdentifier) -> Result<ProbeResult> {
    let event_mask = source.event_bits()?;
    let key_mask = source.key_bits()?;
    let rel_mask = source.rel_bits()?;
    let abs_mask = source.abs_bits()?;
    let sw_mask = source.sw_bits()?;
    let led_mask = source.led_bits()?;
    let ff_mask = source.ff_bits()?;
    let prop_mask = source.prop_bits()?;

    let mut classes = DeviceClassSet::new();

    let has_buttons = key_mask
        .any(KeyCode::BTN_MISC.0 as usize, KEY_MAX as usize + 1)
        .unwrap_or(false);
    if has_buttons {
        classes.insert(DeviceClass::Keyboard);
    }
    let has_alpha = key_mask
        .any(KEY_FIRST_ALPHA as usize, KEY_LAST_ALPHA as usize + 1)
        .unwrap_or(false);
    if has_alpha {
        classes.insert(DeviceClass::AlphaKey);
    }

    let has_abs_xy = abs_mask.test(AbsoluteAxisCode::ABS_X.0 as usize)
        && abs_mask.test(AbsoluteAxisCode::ABS_Y.0 as usize);
    let is_direct = prop_mask.test(PropType::DIRECT.0 as usize);
    let has_mt_slot = abs_mask.test(AbsoluteAxisCode::ABS_MT_SLOT.0 as usize);
    let has_mouse_buttons = key_mask.test(KeyCode::BTN_LEFT.0 as usize)
        || key_mask.test(KeyCode::BTN_RIGHT.0 as usize)
        || key_mask.test(KeyCode::BTN_MIDDLE.0 as usize);
    let has_rel_xy = rel_mask.test(RelativeAxisCode::REL_X.0 as usize)
        && rel_mask.test(RelativeAxisCode::REL_Y.0 as usize);

    if has_abs_xy && is_direct {
        classes.insert(DeviceClass::Touch);
        if has_mt_slot {
            classes.insert(DeviceClass::TouchMt);
        }
    } else if has_abs_xy && !has_mouse_buttons {
        classes.insert(DeviceClass::Joystick);
    }
    if has_rel_xy || (has_abs_xy && has_mouse_buttons) {
        classes.insert(DeviceClass::Cursor);
    }

    let has_dpad = key_mask.test(KeyCode::BTN_DPAD_UP.0 as usize)
        || key_mask.test(KeyCode::BTN_DPAD_DOWN.0 as usize)
        || key_mask.test(KeyCode::BTN_DPAD_LEFT.0 as usize)
        || key_mask.test(KeyCode::BTN_DPAD_RIGHT.0 as usize)
        || abs_mask.test(AbsoluteAxisCode::ABS_HAT0X.0 as usize);
    if has_dpad {
        classes.insert(DeviceClass::Dpad);
        classes.insert(DeviceClass::Keyboard);
    }

    let has_gamepad_buttons = key_mask
        .any(KeyCode::BTN_GAMEPAD.0 as usize, KeyCode::BTN_THUMBR.0 as usize + 1)
        .unwrap_or(false);
    if has_gamepad_buttons {
        classes.insert(DeviceClass::Gamepad);
        classes.insert(DeviceClass::Keyboard);
    }

    let has_joystick_buttons = key_mask
        .any(KeyCode::BTN_JOYSTICK.0 as usize, KeyCode::BTN_PINKIE.0 as usize + 1)
        .unwrap_or(false);
    if has_joystick_buttons {
        classes.insert(DeviceClass::Joystick);
        classes.insert(DeviceClass::Gamepad);
        classes.insert(DeviceClass::Keyboard);
    }

    if sw_mask.width() > 0 && sw_mask.any(0, sw_mask.width()).unwrap_or(false) {
        classes.insert(DeviceClass::Switch);
    }

    if ff_mask.test(FFEffectCode::FF_RUMBLE.0 as usize) {
        classes.insert(DeviceClass::Vibrator);
    }

    let has_led = led_mask.width() > 0 && led_mask.any(0, led_mask.width()).unwrap_or(false);

    if key_mask.test(KeyCode::BTN_STYLUS.0 as usize) {
        classes.insert(DeviceClass::ExternalStylus);
    }

    if EXTERNAL_BUSES.contains(&id.bus) {
        classes.insert(DeviceClass::External);
    }

    Ok(ProbeResult {
        classes,
        event_mask,
        key_mask,
        rel_mask,
        abs_mask,
        sw_mask,
        led_mask,
        ff_mask,
        prop_mask,
        has_led,
    })
}

/// Resolves an absolute axis claimed by more than one class to its owning class, by the fixed
/// priority TouchMt > Touch > Joystick > Cursor (§4.3, ambiguity policy).
pub fn get_abs_axis_usage(classes: &DeviceClassSet) -> Option<DeviceClass> {
    for class in [
        DeviceClass::TouchMt,
        DeviceClass::Touch,
        DeviceClass::Joystick,
        DeviceClass::Cursor,
    ] {
        if classes.contains(class) {
            return Some(class);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inputid::BusType;

    struct FakeSource {
        key: Vec<u16>,
        abs: Vec<u16>,
        rel: Vec<u16>,
        sw: Vec<u16>,
        led: Vec<u16>,
        ff: Vec<u16>,
        prop: Vec<u16>,
    }

    impl Default for FakeSource {
        fn default() -> Self {
            FakeSource {
                key: vec![],
                abs: vec![],
                rel: vec![],
                sw: vec![],
                led: vec![],
                ff: vec![],
                prop: vec![],
            }
        }
    }

    fn mask_from(width: usize, set_bits: &[u16]) -> BitMask {
        let mut mask = BitMask::new(width);
        for &b in set_bits {
            mask.set(b as usize, true);
        }
        mask
    }

    impl CapabilitySource for FakeSource {
        fn event_bits(&self) -> Result<BitMask> {
            Ok(BitMask::new(EV_CNT))
        }
        fn key_bits(&self) -> Result<BitMask> {
            Ok(mask_from(KEY_CNT, &self.key))
        }
        fn rel_bits(&self) -> Result<BitMask> {
            Ok(mask_from(REL_CNT, &self.rel))
        }
        fn abs_bits(&self) -> Result<BitMask> {
            Ok(mask_from(ABS_CNT, &self.abs))
        }
        fn sw_bits(&self) -> Result<BitMask> {
            Ok(mask_from(SW_CNT, &self.sw))
        }
        fn led_bits(&self) -> Result<BitMask> {
            Ok(mask_from(LED_CNT, &self.led))
        }
        fn ff_bits(&self) -> Result<BitMask> {
            Ok(mask_from(FF_CNT, &self.ff))
        }
        fn prop_bits(&self) -> Result<BitMask> {
            Ok(mask_from(INPUT_PROP_CNT, &self.prop))
        }
    }

    fn identifier(bus: u16) -> InputDeviceIdentifier {
        InputDeviceIdentifier {
            name: "test device".into(),
            location: "".into(),
            unique_id: "".into(),
            bus,
            vendor: 0,
            product: 0,
            version: 0,
            descriptor: "test".into(),
        }
    }

    #[test]
    fn keyboard_with_alpha_keys_is_classified() {
        let source = FakeSource {
            key: vec![KeyCode::BTN_MISC.0, KeyCode::KEY_A.0, KeyCode::KEY_ENTER.0],
            ..Default::default()
        };
        let result = probe(&source, &identifier(BusType::BUS_I8042.0)).unwrap();
        assert!(result.classes.contains(DeviceClass::Keyboard));
        assert!(result.classes.contains(DeviceClass::AlphaKey));
        assert!(!result.classes.contains(DeviceClass::External));
    }

    #[test]
    fn direct_touch_with_mt_slot_is_touchmt() {
        let source = FakeSource {
            abs: vec![AbsoluteAxisCode::ABS_X.0, AbsoluteAxisCode::ABS_Y.0, AbsoluteAxisCode::ABS_MT_SLOT.0],
            prop: vec![PropType::DIRECT.0],
            ..Default::default()
        };
        let result = probe(&source, &identifier(BusType::BUS_USB.0)).unwrap();
        assert!(result.classes.contains(DeviceClass::Touch));
        assert!(result.classes.contains(DeviceClass::TouchMt));
        assert!(result.classes.contains(DeviceClass::External));
        assert_eq!(get_abs_axis_usage(&result.classes), Some(DeviceClass::TouchMt));
    }

    #[test]
    fn rumble_bit_marks_vibrator() {
        let source = FakeSource {
            ff: vec![FFEffectCode::FF_RUMBLE.0],
            ..Default::default()
        };
        let result = probe(&source, &identifier(BusType::BUS_USB.0)).unwrap();
        assert!(result.classes.contains(DeviceClass::Vibrator));
    }

    #[test]
    fn gamepad_buttons_imply_keyboard() {
        let source = FakeSource {
            key: vec![KeyCode::BTN_SOUTH.0, KeyCode::BTN_EAST.0],
            ..Default::default()
        };
        let result = probe(&source, &identifier(BusType::BUS_USB.0)).unwrap();
        assert!(result.classes.contains(DeviceClass::Gamepad));
        assert!(result.classes.contains(DeviceClass::Keyboard));
    }
}
