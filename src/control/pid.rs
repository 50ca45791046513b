//! PID compensator core.
//!
//! Three textbook forms over the same error/timestep input:
//!
//! ```text
//! Parallel  u = Kp·e + Ki·∫e dt + Kd·de/dt
//! Ideal     u = K·(e + (1/Ti)·∫e dt + Td·de/dt)
//! Series    u = Kp·(e + (1/Ti)·∫e dt) + Kp·Td·de/dt
//! ```
//!
//! No filtering and no anti-windup at this layer: the output is hard-clipped
//! to `[umin, umax]` and nothing else.  The optional industrial extras live in
//! [`advanced`](super::advanced) and wrap this type.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::Gains;

/// Mathematical form of the compensator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensatorForm {
    #[default]
    Parallel,
    /// ISA / standard form.
    Ideal,
    /// Interacting form.
    Series,
}

impl FromStr for CompensatorForm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(Self::Parallel),
            "ideal" | "isa" => Ok(Self::Ideal),
            "series" => Ok(Self::Series),
            _ => Err(ConfigError::UnknownForm),
        }
    }
}

impl fmt::Display for CompensatorForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parallel => write!(f, "parallel"),
            Self::Ideal => write!(f, "ideal"),
            Self::Series => write!(f, "series"),
        }
    }
}

/// Gains and output bounds for one compensator.
///
/// Parallel reads `kp/ki/kd`, Ideal reads `k/ti/td`, Series reads `kp/ti/td`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompensatorConfig {
    pub form: CompensatorForm,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub k: f32,
    pub ti: f32,
    pub td: f32,
    pub umin: f32,
    pub umax: f32,
}

impl Default for CompensatorConfig {
    fn default() -> Self {
        Self {
            form: CompensatorForm::Parallel,
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            k: 1.0,
            ti: 1.0,
            td: 0.0,
            umin: -1.0,
            umax: 1.0,
        }
    }
}

impl CompensatorConfig {
    /// Build a config for `form` from the three-number gain set used by the
    /// command surface.
    pub fn from_gains(form: CompensatorForm, gains: Gains, umin: f32, umax: f32) -> Self {
        let mut cfg = Self {
            form,
            umin,
            umax,
            ..Self::default()
        };
        cfg.set_gains(gains);
        cfg
    }

    /// Write `gains` into the fields the active form reads.
    pub fn set_gains(&mut self, gains: Gains) {
        match self.form {
            CompensatorForm::Parallel => {
                self.kp = gains.gain;
                self.ki = gains.integral;
                self.kd = gains.derivative;
            }
            CompensatorForm::Ideal => {
                self.k = gains.gain;
                self.ti = gains.integral;
                self.td = gains.derivative;
            }
            CompensatorForm::Series => {
                self.kp = gains.gain;
                self.ti = gains.integral;
                self.td = gains.derivative;
            }
        }
    }

    /// The three numbers the active form reads.
    pub fn gains(&self) -> Gains {
        match self.form {
            CompensatorForm::Parallel => Gains::new(self.kp, self.ki, self.kd),
            CompensatorForm::Ideal => Gains::new(self.k, self.ti, self.td),
            CompensatorForm::Series => Gains::new(self.kp, self.ti, self.td),
        }
    }

    /// Reject values the update formulas are not defined for.
    ///
    /// `Ti = 0` is allowed: the integral term is guarded and reads as zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.kp, self.ki, self.kd, self.k, self.ti, self.td];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationFailed("gains must be finite"));
        }
        if self.ti < 0.0 {
            return Err(ConfigError::NegativeTimeConstant("Ti"));
        }
        if self.td < 0.0 {
            return Err(ConfigError::NegativeTimeConstant("Td"));
        }
        if !self.umin.is_finite() || !self.umax.is_finite() || self.umin > self.umax {
            return Err(ConfigError::InvalidOutputBounds);
        }
        Ok(())
    }
}

/// PID controller
pub struct PidController {
    cfg: CompensatorConfig,
    integral: f32,
    last_error: f32,
    last_p: f32,
    last_i: f32,
    last_d: f32,
    /// `P + I + D` before clipping.
    last_raw: f32,
}

impl PidController {
    pub fn new(cfg: CompensatorConfig) -> Self {
        Self {
            cfg,
            integral: 0.0,
            last_error: 0.0,
            last_p: 0.0,
            last_i: 0.0,
            last_d: 0.0,
            last_raw: 0.0,
        }
    }

    /// Replace the configuration and clear all history.
    pub fn apply(&mut self, cfg: CompensatorConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        self.cfg = cfg;
        self.reset();
        Ok(())
    }

    pub fn config(&self) -> &CompensatorConfig {
        &self.cfg
    }

    /// One compensation step for error `e = setpoint - measurement`.
    ///
    /// `dt <= 0` yields no derivative contribution; `dt` is not clamped here.
    pub fn update(&mut self, e: f32, dt: f32) -> f32 {
        self.integral += e * dt;
        let de_dt = if dt > 0.0 {
            (e - self.last_error) / dt
        } else {
            0.0
        };

        let cfg = &self.cfg;
        let (p, i, d) = match cfg.form {
            CompensatorForm::Parallel => (cfg.kp * e, cfg.ki * self.integral, cfg.kd * de_dt),
            CompensatorForm::Ideal => (
                cfg.k * e,
                cfg.k * integral_over(self.integral, cfg.ti),
                cfg.k * (cfg.td * de_dt),
            ),
            CompensatorForm::Series => (
                cfg.kp * e,
                cfg.kp * integral_over(self.integral, cfg.ti),
                cfg.kp * (cfg.td * de_dt),
            ),
        };

        let u = p + i + d;

        self.last_p = p;
        self.last_i = i;
        self.last_d = d;
        self.last_raw = u;
        self.last_error = e;

        self.saturate(u)
    }

    /// Hard clip to `[umin, umax]`.
    pub fn saturate(&self, u: f32) -> f32 {
        if u > self.cfg.umax {
            self.cfg.umax
        } else if u < self.cfg.umin {
            self.cfg.umin
        } else {
            u
        }
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
        self.last_p = 0.0;
        self.last_i = 0.0;
        self.last_d = 0.0;
        self.last_raw = 0.0;
    }

    /// Shift the integral accumulator (used by back-calculation anti-windup).
    pub fn unwind_integral(&mut self, delta: f32) {
        self.integral += delta;
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn last_p(&self) -> f32 {
        self.last_p
    }

    pub fn last_i(&self) -> f32 {
        self.last_i
    }

    pub fn last_d(&self) -> f32 {
        self.last_d
    }

    /// Unclipped `P + I + D` of the last update.
    pub fn last_unsaturated(&self) -> f32 {
        self.last_raw
    }
}

fn integral_over(accumulated: f32, ti: f32) -> f32 {
    if ti != 0.0 { accumulated / ti } else { 0.0 }
}
