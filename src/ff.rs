//! Force-feedback effect description and its (un)packing to the raw `ff_effect` ioctl payload.
//!
//! Adapted from the reference crate's `ff.rs`, trimmed to the two effect kinds the vibration
//! surface (§4.9) actually needs: `Rumble` (two-motor magnitude, the common case for phones and
//! gamepads) and `Periodic` (an arbitrary waveform pattern, for devices that want more than a
//! flat buzz).

use crate::attribute_set::EvdevEnum;
use crate::compat::{ff_envelope, ff_replay, ff_trigger};
use crate::constants::FFEffectCode;
use crate::sys;

/// An attack/fade envelope for a periodic effect.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FFEnvelope {
    pub attack_length: u16,
    pub attack_level: u16,
    pub fade_length: u16,
    pub fade_level: u16,
}

impl From<ff_envelope> for FFEnvelope {
    fn from(value: ff_envelope) -> Self {
        Self {
            attack_length: value.attack_length,
            attack_level: value.attack_level,
            fade_length: value.fade_length,
            fade_level: value.fade_level,
        }
    }
}

impl From<FFEnvelope> for ff_envelope {
    fn from(other: FFEnvelope) -> Self {
        ff_envelope {
            attack_length: other.attack_length,
            attack_level: other.attack_level,
            fade_length: other.fade_length,
            fade_level: other.fade_level,
        }
    }
}

/// Waveform shape for a [`FFEffectKind::Periodic`] effect.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FFWaveform {
    Square,
    Triangle,
    Sine,
    SawUp,
    SawDown,
}

impl From<FFWaveform> for FFEffectCode {
    fn from(other: FFWaveform) -> Self {
        match other {
            FFWaveform::Square => FFEffectCode::FF_SQUARE,
            FFWaveform::Triangle => FFEffectCode::FF_TRIANGLE,
            FFWaveform::Sine => FFEffectCode::FF_SINE,
            FFWaveform::SawUp => FFEffectCode::FF_SAW_UP,
            FFWaveform::SawDown => FFEffectCode::FF_SAW_DOWN,
        }
    }
}

/// The vibration waveform the hub is asked to play, independent of the kernel wire format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FFEffectKind {
    Periodic {
        waveform: FFWaveform,
        period_ms: u16,
        magnitude: i16,
        offset: i16,
        phase: u16,
        envelope: FFEnvelope,
    },
    Rumble {
        strong_magnitude: u16,
        weak_magnitude: u16,
    },
}

impl From<FFEffectKind> for FFEffectCode {
    fn from(other: FFEffectKind) -> Self {
        match other {
            FFEffectKind::Periodic { .. } => FFEffectCode::FF_PERIODIC,
            FFEffectKind::Rumble { .. } => FFEffectCode::FF_RUMBLE,
        }
    }
}

/// Trigger conditions for the effect (rarely used outside joystick drivers).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FFTrigger {
    pub button: u16,
    pub interval: u16,
}

impl From<ff_trigger> for FFTrigger {
    fn from(value: ff_trigger) -> Self {
        Self {
            button: value.button,
            interval: value.interval,
        }
    }
}

impl From<FFTrigger> for ff_trigger {
    fn from(other: FFTrigger) -> Self {
        ff_trigger {
            button: other.button,
            interval: other.interval,
        }
    }
}

/// Scheduling: how long the effect plays and how long to wait before it starts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FFReplay {
    pub length: u16,
    pub delay: u16,
}

impl From<ff_replay> for FFReplay {
    fn from(value: ff_replay) -> Self {
        Self {
            length: value.length,
            delay: value.delay,
        }
    }
}

impl From<FFReplay> for ff_replay {
    fn from(other: FFReplay) -> Self {
        ff_replay {
            length: other.length,
            delay: other.delay,
        }
    }
}

/// A fully described force-feedback effect, ready to upload via `EVIOCSFF`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FFEffectData {
    pub direction: u16,
    pub trigger: FFTrigger,
    pub replay: FFReplay,
    pub kind: FFEffectKind,
}

impl FFEffectData {
    /// A one-shot rumble effect playing immediately at the given motor magnitudes.
    pub fn rumble(strong_magnitude: u16, weak_magnitude: u16, length_ms: u16) -> Self {
        FFEffectData {
            direction: 0,
            trigger: FFTrigger::default(),
            replay: FFReplay {
                length: length_ms,
                delay: 0,
            },
            kind: FFEffectKind::Rumble {
                strong_magnitude,
                weak_magnitude,
            },
        }
    }
}

impl From<sys::ff_effect> for FFEffectData {
    fn from(value: sys::ff_effect) -> Self {
        let kind = match FFEffectCode::from_index(value.type_ as usize) {
            FFEffectCode::FF_PERIODIC => {
                let periodic = unsafe { value.u.periodic };
                FFEffectKind::Periodic {
                    waveform: match FFEffectCode::from_index(periodic.waveform as usize) {
                        FFEffectCode::FF_SQUARE => FFWaveform::Square,
                        FFEffectCode::FF_TRIANGLE => FFWaveform::Triangle,
                        FFEffectCode::FF_SINE => FFWaveform::Sine,
                        FFEffectCode::FF_SAW_UP => FFWaveform::SawUp,
                        FFEffectCode::FF_SAW_DOWN => FFWaveform::SawDown,
                        _ => FFWaveform::Sine,
                    },
                    period_ms: periodic.period,
                    magnitude: periodic.magnitude,
                    offset: periodic.offset,
                    phase: periodic.phase,
                    envelope: periodic.envelope.into(),
                }
            }
            _ => {
                let rumble = unsafe { value.u.rumble };
                FFEffectKind::Rumble {
                    strong_magnitude: rumble.strong_magnitude,
                    weak_magnitude: rumble.weak_magnitude,
                }
            }
        };

        Self {
            direction: value.direction,
            trigger: value.trigger.into(),
            replay: value.replay.into(),
            kind,
        }
    }
}

impl From<FFEffectData> for sys::ff_effect {
    fn from(other: FFEffectData) -> Self {
        let mut effect: sys::ff_effect = unsafe { std::mem::zeroed() };

        let type_: FFEffectCode = other.kind.into();
        effect.type_ = type_.0;
        effect.id = -1;
        effect.direction = other.direction;
        effect.trigger = other.trigger.into();
        effect.replay = other.replay.into();

        match other.kind {
            FFEffectKind::Periodic {
                waveform,
                period_ms,
                magnitude,
                offset,
                phase,
                envelope,
            } => {
                let waveform: FFEffectCode = waveform.into();
                effect.u.periodic.waveform = waveform.0;
                effect.u.periodic.period = period_ms;
                effect.u.periodic.magnitude = magnitude;
                effect.u.periodic.offset = offset;
                effect.u.periodic.phase = phase;
                effect.u.periodic.envelope = envelope.into();
            }
            FFEffectKind::Rumble {
                strong_magnitude,
                weak_magnitude,
            } => {
                effect.u.rumble.strong_magnitude = strong_magnitude;
                effect.u.rumble.weak_magnitude = weak_magnitude;
            }
        }

        effect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rumble_round_trips_through_raw_effect() {
        let data = FFEffectData::rumble(0x8000, 0x4000, 300);
        let raw: sys::ff_effect = data.into();
        let back: FFEffectData = raw.into();
        match back.kind {
            FFEffectKind::Rumble {
                strong_magnitude,
                weak_magnitude,
            } => {
                assert_eq!(strong_magnitude, 0x8000);
                assert_eq!(weak_magnitude, 0x4000);
            }
            _ => panic!("expected rumble"),
        }
        assert_eq!(back.replay.length, 300);
    }
}
