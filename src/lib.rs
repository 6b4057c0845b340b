//! Kernel-facing input event hub: device discovery, capability probing, and a unified evdev
//! event stream (§1).
//!
//! The [`EventHub`] is the single aggregation point for raw evdev traffic across every attached
//! human-interface device plus paired touch-video streams. Everything downstream of opening a
//! descriptor -- decoding, state caching, vibration, LEDs -- is reachable from it; device
//! discovery and readiness multiplexing are its private implementation, exposed here only so
//! tests and an embedding binary can assemble a hub with a custom [`device_manager::DeviceOpener`].

pub mod attribute_set;
pub mod bitmask;
pub mod capability_probe;
mod compat;
pub mod config;
pub mod constants;
pub mod controller_pool;
pub mod device_manager;
pub mod device_record;
pub mod device_state;
pub mod epoll_pump;
pub mod error;
pub mod ff;
pub mod hub;
pub mod inputid;
pub mod keymap;
pub mod raw_event;
mod sys;
pub mod video;

pub use error::{Error, Result};
pub use hub::{EventHub, RealDeviceOpener, StateValue};
pub use raw_event::{DeviceClass, DeviceClassSet, DeviceId, InputDeviceIdentifier, RawEvent};
