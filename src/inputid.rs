//! `input_id` wrapper and the `BUS_*` bus type constants, used to build an
//! [`crate::raw_event::InputDeviceIdentifier`] from `EVIOCGID`.

use crate::attribute_set::evdev_enum;
use crate::compat::input_id;
use std::fmt;

#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct InputId(pub(crate) input_id);

impl From<input_id> for InputId {
    #[inline]
    fn from(id: input_id) -> Self {
        Self(id)
    }
}

impl InputId {
    pub fn bus_type(&self) -> BusType {
        BusType(self.0.bustype)
    }
    pub fn vendor(&self) -> u16 {
        self.0.vendor
    }
    pub fn product(&self) -> u16 {
        self.0.product
    }
    pub fn version(&self) -> u16 {
        self.0.version
    }
}

impl fmt::Debug for InputId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InputId")
            .field("bus_type", &self.bus_type())
            .field("vendor", &format_args!("{:#x}", self.vendor()))
            .field("product", &format_args!("{:#x}", self.product()))
            .field("version", &format_args!("{:#x}", self.version()))
            .finish()
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BusType(pub u16);

evdev_enum!(
    BusType,
    BUS_PCI = 0x01,
    BUS_USB = 0x03,
    BUS_BLUETOOTH = 0x05,
    BUS_VIRTUAL = 0x06,
    BUS_I8042 = 0x11,
    BUS_RS232 = 0x13,
    BUS_GAMEPORT = 0x14,
    BUS_I2C = 0x18,
    BUS_HOST = 0x19,
    BUS_SPI = 0x1C,
);

/// Buses carried over an external connector, used by the external-bus probe heuristic (§4.3).
pub const EXTERNAL_BUSES: &[u16] = &[BusType::BUS_USB.0, BusType::BUS_BLUETOOTH.0];

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            Self::BUS_PCI => "PCI",
            Self::BUS_USB => "USB",
            Self::BUS_BLUETOOTH => "Bluetooth",
            Self::BUS_VIRTUAL => "Virtual",
            Self::BUS_I8042 => "i8042",
            Self::BUS_RS232 => "RS232",
            Self::BUS_GAMEPORT => "Gameport",
            Self::BUS_I2C => "I2C",
            Self::BUS_HOST => "Host",
            Self::BUS_SPI => "SPI",
            _ => "Unknown",
        };
        f.write_str(s)
    }
}
