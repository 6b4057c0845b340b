//! Platform shim for the raw evdev C structures.
//!
//! `libc` only exposes these on Linux-family targets. Elsewhere we carry a hand copy so the rest
//! of the crate can be written against a single set of types, even though the hub itself only
//! does anything useful on Linux.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "l4re",
        target_os = "android",
        target_os = "emscripten"
    ))] {
        pub(crate) use libc::{
            ff_condition_effect, ff_constant_effect, ff_envelope, ff_periodic_effect, ff_ramp_effect,
            ff_replay, ff_rumble_effect, ff_trigger, input_absinfo, input_event, input_id,
            ABS_CNT, EV_CNT, FF_CNT, INPUT_PROP_CNT, KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT,
            SW_CNT,
        };
    } else {
        mod non_linux;
        pub(crate) use non_linux::{
            ff_condition_effect, ff_constant_effect, ff_envelope, ff_periodic_effect, ff_ramp_effect,
            ff_replay, ff_rumble_effect, ff_trigger, input_absinfo, input_event, input_id,
            ABS_CNT, EV_CNT, FF_CNT, INPUT_PROP_CNT, KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT,
            SW_CNT,
        };
    }
}
