//! The live-state mirrors a [`crate::device_record::DeviceRecord`] keeps so that state queries
//! (§4.8) don't have to re-ioctl the kernel on every call.
//!
//! Grounded on the reference crate's `device_state.rs`, which plays the same role for its
//! `Device::cached_state()`; the invariant carried over is the spec's I-4: `key_state.test(c)` (or
//! `sw_state.test(c)`) is only ever consulted where the corresponding capability bitmask already
//! says the code is supported.

use crate::bitmask::BitMask;
use crate::constants::{AbsoluteAxisCode, EventType, ABS_CNT, KEY_CNT, SW_CNT};

/// Cached key, switch and absolute-axis values, refreshed as evdev records are read.
#[derive(Clone, Debug)]
pub struct DeviceLiveState {
    pub(crate) key_state: BitMask,
    pub(crate) sw_state: BitMask,
    pub(crate) abs_values: Box<[i32; ABS_CNT]>,
}

impl DeviceLiveState {
    pub fn new() -> Self {
        DeviceLiveState {
            key_state: BitMask::new(KEY_CNT),
            sw_state: BitMask::new(SW_CNT),
            abs_values: Box::new([0; ABS_CNT]),
        }
    }

    /// Applies one decoded evdev record to the cached mirrors. Non-key/switch/abs events (sync,
    /// LED echoes, ...) are ignored here; they still reach the consumer as
    /// [`crate::raw_event::RawEvent`]s.
    pub fn apply(&mut self, ev_type: u16, code: u16, value: i32) {
        if ev_type == EventType::KEY.0 {
            self.key_state.set(code as usize, value != 0);
        } else if ev_type == EventType::SWITCH.0 {
            self.sw_state.set(code as usize, value != 0);
        } else if ev_type == EventType::ABSOLUTE.0 && (code as usize) < ABS_CNT {
            self.abs_values[code as usize] = value;
        }
    }

    pub fn key(&self, code: u16) -> bool {
        self.key_state.test(code as usize)
    }

    pub fn switch(&self, code: u16) -> bool {
        self.sw_state.test(code as usize)
    }

    pub fn abs_value(&self, axis: AbsoluteAxisCode) -> i32 {
        self.abs_values
            .get(axis.0 as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for DeviceLiveState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_press_and_release_round_trip() {
        let mut state = DeviceLiveState::new();
        assert!(!state.key(30));
        state.apply(EventType::KEY.0, 30, 1);
        assert!(state.key(30));
        state.apply(EventType::KEY.0, 30, 0);
        assert!(!state.key(30));
    }

    #[test]
    fn abs_value_tracks_last_seen() {
        let mut state = DeviceLiveState::new();
        state.apply(EventType::ABSOLUTE.0, AbsoluteAxisCode::ABS_X.0, 512);
        assert_eq!(state.abs_value(AbsoluteAxisCode::ABS_X), 512);
    }
}
