//! Numeric evdev constants, typed through [`crate::attribute_set::EvdevEnum`].
//!
//! Each type here is a thin newtype over the kernel's `u16` code space for one evdev domain
//! (event types, keys, absolute axes, ...). Grouping them this way -- rather than one giant enum
//! -- mirrors how the kernel itself partitions `EVIOCGBIT` by domain, and lets [`crate::bitmask`]
//! stay domain-agnostic.

use crate::attribute_set::evdev_enum;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EventType(pub u16);

evdev_enum!(
    EventType,
    SYNCHRONIZATION = 0x00,
    KEY = 0x01,
    RELATIVE = 0x02,
    ABSOLUTE = 0x03,
    MISC = 0x04,
    SWITCH = 0x05,
    LED = 0x11,
    SOUND = 0x12,
    REPEAT = 0x14,
    FORCEFEEDBACK = 0x15,
    POWER = 0x16,
    FORCEFEEDBACKSTATUS = 0x17,
);

pub const EV_MAX: u16 = 0x1f;
pub const EV_CNT: usize = EV_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PropType(pub u16);

evdev_enum!(
    PropType,
    POINTER = 0x00,
    DIRECT = 0x01,
    BUTTONPAD = 0x02,
    SEMI_MT = 0x03,
    TOPBUTTONPAD = 0x04,
    POINTING_STICK = 0x05,
    ACCELEROMETER = 0x06,
);

pub const INPUT_PROP_MAX: u16 = 0x1f;
pub const INPUT_PROP_CNT: usize = INPUT_PROP_MAX as usize + 1;

/// A keycode, shared by the `KEY` and `BTN` kernel namespaces (they live in the same bit-space).
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct KeyCode(pub u16);

evdev_enum!(
    KeyCode,
    KEY_RESERVED = 0,
    KEY_ESC = 1,
    KEY_1 = 2,
    KEY_2 = 3,
    KEY_3 = 4,
    KEY_4 = 5,
    KEY_5 = 6,
    KEY_6 = 7,
    KEY_7 = 8,
    KEY_8 = 9,
    KEY_9 = 10,
    KEY_0 = 11,
    KEY_MINUS = 12,
    KEY_EQUAL = 13,
    KEY_BACKSPACE = 14,
    KEY_TAB = 15,
    KEY_Q = 16,
    KEY_W = 17,
    KEY_E = 18,
    KEY_R = 19,
    KEY_T = 20,
    KEY_Y = 21,
    KEY_U = 22,
    KEY_I = 23,
    KEY_O = 24,
    KEY_P = 25,
    KEY_LEFTBRACE = 26,
    KEY_RIGHTBRACE = 27,
    KEY_ENTER = 28,
    KEY_LEFTCTRL = 29,
    KEY_A = 30,
    KEY_S = 31,
    KEY_D = 32,
    KEY_F = 33,
    KEY_G = 34,
    KEY_H = 35,
    KEY_J = 36,
    KEY_K = 37,
    KEY_L = 38,
    KEY_SEMICOLON = 39,
    KEY_APOSTROPHE = 40,
    KEY_GRAVE = 41,
    KEY_LEFTSHIFT = 42,
    KEY_BACKSLASH = 43,
    KEY_Z = 44,
    KEY_X = 45,
    KEY_C = 46,
    KEY_V = 47,
    KEY_B = 48,
    KEY_N = 49,
    KEY_M = 50,
    KEY_COMMA = 51,
    KEY_DOT = 52,
    KEY_SLASH = 53,
    KEY_RIGHTSHIFT = 54,
    KEY_LEFTALT = 56,
    KEY_SPACE = 57,
    KEY_CAPSLOCK = 58,
    KEY_NUMLOCK = 69,
    KEY_SCROLLLOCK = 70,
    KEY_UP = 103,
    KEY_LEFT = 105,
    KEY_RIGHT = 106,
    KEY_DOWN = 108,
    KEY_RIGHTCTRL = 97,
    KEY_RIGHTALT = 100,
    KEY_HOME = 102,
    KEY_END = 107,
    // start of the BTN_MISC range the kernel uses as the floor of "this device has buttons"
    BTN_MISC = 0x100,
    BTN_0 = 0x100,
    BTN_1 = 0x101,
    BTN_MOUSE = 0x110,
    BTN_LEFT = 0x110,
    BTN_RIGHT = 0x111,
    BTN_MIDDLE = 0x112,
    BTN_JOYSTICK = 0x120,
    BTN_TRIGGER = 0x120,
    BTN_THUMB = 0x121,
    BTN_THUMB2 = 0x122,
    BTN_TOP = 0x123,
    BTN_TOP2 = 0x124,
    BTN_PINKIE = 0x125,
    BTN_GAMEPAD = 0x130,
    BTN_SOUTH = 0x130,
    BTN_EAST = 0x131,
    BTN_NORTH = 0x133,
    BTN_WEST = 0x134,
    BTN_TL = 0x136,
    BTN_TR = 0x137,
    BTN_TL2 = 0x138,
    BTN_TR2 = 0x139,
    BTN_SELECT = 0x13a,
    BTN_START = 0x13b,
    BTN_MODE = 0x13c,
    BTN_THUMBL = 0x13d,
    BTN_THUMBR = 0x13e,
    BTN_DPAD_UP = 0x220,
    BTN_DPAD_DOWN = 0x221,
    BTN_DPAD_LEFT = 0x222,
    BTN_DPAD_RIGHT = 0x223,
    BTN_TOOL_PEN = 0x140,
    BTN_TOOL_FINGER = 0x145,
    BTN_TOUCH = 0x14a,
    BTN_STYLUS = 0x14b,
    BTN_STYLUS2 = 0x14c,
);

pub const KEY_MAX: u16 = 0x2ff;
pub const KEY_CNT: usize = KEY_MAX as usize + 1;

/// Lowest alphabetic key, used by the `AlphaKey` classification rule.
pub const KEY_FIRST_ALPHA: u16 = KeyCode::KEY_Q.0;
/// Highest alphabetic key used in the classic QWERTY layout's letter rows.
pub const KEY_LAST_ALPHA: u16 = KeyCode::KEY_M.0;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RelativeAxisCode(pub u16);

evdev_enum!(
    RelativeAxisCode,
    REL_X = 0x00,
    REL_Y = 0x01,
    REL_Z = 0x02,
    REL_WHEEL = 0x08,
    REL_MISC = 0x09,
);

pub const REL_MAX: u16 = 0x0f;
pub const REL_CNT: usize = REL_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AbsoluteAxisCode(pub u16);

evdev_enum!(
    AbsoluteAxisCode,
    ABS_X = 0x00,
    ABS_Y = 0x01,
    ABS_Z = 0x02,
    ABS_RX = 0x03,
    ABS_RY = 0x04,
    ABS_RZ = 0x05,
    ABS_THROTTLE = 0x06,
    ABS_HAT0X = 0x10,
    ABS_HAT0Y = 0x11,
    ABS_HAT1X = 0x12,
    ABS_HAT1Y = 0x13,
    ABS_HAT2X = 0x14,
    ABS_HAT2Y = 0x15,
    ABS_HAT3X = 0x16,
    ABS_HAT3Y = 0x17,
    ABS_PRESSURE = 0x18,
    ABS_MT_SLOT = 0x2f,
    ABS_MT_TOUCH_MAJOR = 0x30,
    ABS_MT_POSITION_X = 0x35,
    ABS_MT_POSITION_Y = 0x36,
    ABS_MT_TRACKING_ID = 0x39,
);

pub const ABS_MAX: u16 = 0x3f;
pub const ABS_CNT: usize = ABS_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SwitchCode(pub u16);

evdev_enum!(
    SwitchCode,
    SW_LID = 0x00,
    SW_TABLET_MODE = 0x01,
    SW_HEADPHONE_INSERT = 0x02,
    SW_MICROPHONE_INSERT = 0x04,
    SW_ROTATE_LOCK = 0x0c,
);

pub const SW_MAX: u16 = 0x10;
pub const SW_CNT: usize = SW_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct LedCode(pub u16);

evdev_enum!(
    LedCode,
    LED_NUML = 0x00,
    LED_CAPSL = 0x01,
    LED_SCROLLL = 0x02,
    LED_COMPOSE = 0x03,
    LED_KANA = 0x04,
    LED_SLEEP = 0x05,
    LED_SUSPEND = 0x06,
    LED_MUTE = 0x07,
    LED_MISC = 0x08,
    LED_MAIL = 0x09,
    LED_CHARGING = 0x0a,
    LED_PLAYER1 = 0x0b,
    LED_PLAYER2 = 0x0c,
    LED_PLAYER3 = 0x0d,
    LED_PLAYER4 = 0x0e,
);

pub const LED_MAX: u16 = 0x0f;
pub const LED_CNT: usize = LED_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MiscCode(pub u16);

evdev_enum!(MiscCode, MSC_SERIAL = 0x00, MSC_RAW = 0x03, MSC_SCAN = 0x04,);

pub const MSC_MAX: u16 = 0x07;
pub const MSC_CNT: usize = MSC_MAX as usize + 1;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SoundCode(pub u16);

evdev_enum!(SoundCode, SND_CLICK = 0x00, SND_BELL = 0x01, SND_TONE = 0x02,);

pub const SND_MAX: u16 = 0x07;
pub const SND_CNT: usize = SND_MAX as usize + 1;

/// Force-feedback effect and waveform codes (`FF_*`). Distinct from the `FORCEFEEDBACK` event
/// type: this is the per-effect capability bitmap returned by `EVIOCGBIT(EV_FF, ...)`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FFEffectCode(pub u16);

evdev_enum!(
    FFEffectCode,
    FF_RUMBLE = 0x50,
    FF_PERIODIC = 0x51,
    FF_CONSTANT = 0x52,
    FF_SQUARE = 0x58,
    FF_TRIANGLE = 0x59,
    FF_SINE = 0x5a,
    FF_SAW_UP = 0x5b,
    FF_SAW_DOWN = 0x5c,
    FF_GAIN = 0x60,
);

pub const FF_MAX: u16 = 0x7f;
pub const FF_CNT: usize = FF_MAX as usize + 1;
