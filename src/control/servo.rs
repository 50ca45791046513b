//! Controller output ↔ servo pulse width.
//!
//! Output `u ∈ [-1, 1]` maps around the pulse midpoint
//! (`pulse = mid + u·span`); a manual position `p ∈ [0, 1]` maps linearly
//! across the range (`pulse = min + p·(max − min)`).  Both clamp to the
//! physical bounds and round to whole microseconds.

use crate::error::ConfigError;

/// Physical servo pulse bounds in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRange {
    pub min_us: u16,
    pub max_us: u16,
}

/// A pulse ready to send, plus whether clamping pinned it to a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseCommand {
    pub pulse_us: u16,
    pub saturated: bool,
}

impl PulseRange {
    pub fn new(min_us: u16, max_us: u16) -> Result<Self, ConfigError> {
        if min_us >= max_us {
            return Err(ConfigError::InvalidPulseRange);
        }
        Ok(Self { min_us, max_us })
    }

    pub fn mid(&self) -> f32 {
        (f32::from(self.min_us) + f32::from(self.max_us)) / 2.0
    }

    pub fn span(&self) -> f32 {
        (f32::from(self.max_us) - f32::from(self.min_us)) / 2.0
    }

    /// Neutral (centre) pulse.
    pub fn neutral(&self) -> u16 {
        self.mid().round() as u16
    }

    /// Map a controller output.
    pub fn from_output(&self, u: f32) -> PulseCommand {
        self.clamp_round(self.mid() + u * self.span())
    }

    /// Map a normalized manual position; the input is clamped to `[0, 1]`.
    pub fn from_position(&self, position: f32) -> PulseCommand {
        let p = position.clamp(0.0, 1.0);
        let width = f32::from(self.max_us) - f32::from(self.min_us);
        self.clamp_round(f32::from(self.min_us) + p * width)
    }

    /// Inverse of [`from_output`](Self::from_output) for unclamped pulses.
    pub fn to_output(&self, pulse_us: u16) -> f32 {
        (f32::from(pulse_us) - self.mid()) / self.span()
    }

    /// Inverse of [`from_position`](Self::from_position), clamped to `[0, 1]`.
    pub fn to_position(&self, pulse_us: u16) -> f32 {
        let width = f32::from(self.max_us) - f32::from(self.min_us);
        if width <= 0.0 {
            return 0.5;
        }
        ((f32::from(pulse_us) - f32::from(self.min_us)) / width).clamp(0.0, 1.0)
    }

    fn clamp_round(&self, pulse: f32) -> PulseCommand {
        let lo = f32::from(self.min_us);
        let hi = f32::from(self.max_us);
        let clamped = if pulse.is_nan() { self.mid() } else { pulse.clamp(lo, hi) };
        PulseCommand {
            pulse_us: clamped.round() as u16,
            saturated: clamped == lo || clamped == hi,
        }
    }
}
