//! Raw evdev ioctl bindings, trimmed to the surface this hub actually drives (§6 of the design:
//! `EVIOCGBIT`, `EVIOCGABS`, `EVIOCGKEY`, `EVIOCGSW`, `EVIOCGLED`, `EVIOCGID`, `EVIOCGNAME`,
//! `EVIOCGUNIQ`, `EVIOCGPHYS`, `EVIOCGPROP`, `EVIOCSFF`, `EVIOCRMFF`).
//!
//! No uinput surface here: this crate never creates virtual kernel devices, only real and
//! in-process-synthetic ones (see `DeviceRecord`'s virtual sentinel).

use crate::compat::{
    ff_condition_effect, ff_constant_effect, ff_periodic_effect, ff_ramp_effect, ff_replay,
    ff_rumble_effect, ff_trigger, input_absinfo, input_id,
};
use nix::{
    convert_ioctl_res, ioctl_read, ioctl_read_buf, ioctl_readwrite, ioctl_write_int,
    request_code_read,
};

#[repr(C)]
#[derive(Clone, Copy)]
pub union ff_effect_union {
    pub constant: ff_constant_effect,
    pub ramp: ff_ramp_effect,
    pub periodic: ff_periodic_effect,
    pub condition: [ff_condition_effect; 2],
    pub rumble: ff_rumble_effect,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ff_effect {
    pub type_: u16,
    pub id: i16,
    pub direction: u16,
    pub trigger: ff_trigger,
    pub replay: ff_replay,
    pub u: ff_effect_union,
}

ioctl_read!(eviocgid, b'E', 0x02, input_id);
ioctl_write_int!(eviocrmff, b'E', 0x81);

ioctl_read_buf!(eviocgname, b'E', 0x06, u8);
ioctl_read_buf!(eviocgphys, b'E', 0x07, u8);
ioctl_read_buf!(eviocguniq, b'E', 0x08, u8);
ioctl_read_buf!(eviocgprop, b'E', 0x09, u8);
ioctl_read_buf!(eviocgkey, b'E', 0x18, u8);
ioctl_read_buf!(eviocgled, b'E', 0x19, u8);
ioctl_read_buf!(eviocgsw, b'E', 0x1b, u8);

// Write *and* read: the kernel allocates an effect id and writes it back into `ff_effect::id`.
ioctl_readwrite!(eviocsff, b'E', 0x80, ff_effect);

macro_rules! eviocgbit_ioctl {
    ($mac:ident!($name:ident, $ev:ident, $ty:ty)) => {
        eviocgbit_ioctl!($mac!($name, $crate::constants::EventType::$ev.0, $ty));
    };
    ($mac:ident!($name:ident, $ev:expr, $ty:ty)) => {
        $mac!($name, b'E', 0x20 + $ev, $ty);
    };
}

eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_type, 0, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_key, KEY, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_relative, RELATIVE, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_absolute, ABSOLUTE, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_switch, SWITCH, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_led, LED, u8));
eviocgbit_ioctl!(ioctl_read_buf!(eviocgbit_ff, FORCEFEEDBACK, u8));

/// `EVIOCGABS`: get abs value/limits for one absolute axis.
///
/// # Safety
///
/// `abs` must be a valid, device-supported axis index; the fd must refer to an open evdev node.
pub unsafe fn eviocgabs(
    fd: std::os::unix::io::RawFd,
    abs: u32,
    buf: &mut input_absinfo,
) -> nix::Result<libc::c_int> {
    assert!(abs <= crate::constants::ABS_MAX as u32);
    convert_ioctl_res!(libc::ioctl(
        fd,
        request_code_read!(b'E', 0x40 + abs, std::mem::size_of::<input_absinfo>()) as _,
        buf as *mut input_absinfo
    ))
}
