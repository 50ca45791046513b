//! Optional compensation extras layered over [`PidController`].
//!
//! Each toggle is independent:
//!
//! - **Setpoint weighting**: the core sees `eP = β·r − y` instead of `e`.
//! - **Anti-windup** (back-calculation, once per tick): when the unclipped
//!   core output leaves `[umin, umax]`, the accumulator moves by
//!   `−(u − bound)·Tt`.
//! - **Derivative filter**: `D_f ← α·D_f + (1 − α)·D`, `α = Td / (Td + N·dt)`,
//!   and the output is rebuilt as `P + I + D_f` without clipping.
//! - **Feed-forward**: `+ Kff·r`, added last and *not* re-clipped, so the
//!   returned value may leave `[umin, umax]`.
//!
//! With every toggle off the layer is a pass-through to the core.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::pid::{CompensatorConfig, PidController};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvancedConfig {
    pub anti_windup: bool,
    pub derivative_filter: bool,
    pub setpoint_weighting: bool,
    pub feed_forward: bool,

    /// Anti-windup back-calculation constant.
    pub tt: f32,
    /// Derivative filter ratio.
    pub n: f32,
    /// Proportional setpoint weight.
    pub beta: f32,
    /// Derivative setpoint weight.
    pub gamma: f32,
    /// Feed-forward gain.
    pub kff: f32,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            anti_windup: false,
            derivative_filter: false,
            setpoint_weighting: false,
            feed_forward: false,
            tt: 0.1,
            n: 10.0,
            beta: 1.0,
            gamma: 1.0,
            kff: 0.0,
        }
    }
}

impl AdvancedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [self.tt, self.n, self.beta, self.gamma, self.kff];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::ValidationFailed("advanced parameters must be finite"));
        }
        if self.tt < 0.0 {
            return Err(ConfigError::NegativeTimeConstant("Tt"));
        }
        if self.n <= 0.0 {
            return Err(ConfigError::NonPositiveFilterRatio);
        }
        Ok(())
    }
}

/// A [`PidController`] plus the optional extras.
pub struct AdvancedPid {
    core: PidController,
    cfg: AdvancedConfig,
    /// Filtered derivative memory.
    last_df: f32,
    /// Derivative contribution that actually reached the output.
    last_d: f32,
    /// Weighted proportional / derivative errors of the last update.
    last_ep: f32,
    last_ed: f32,
}

impl AdvancedPid {
    pub fn new(core: PidController, cfg: AdvancedConfig) -> Self {
        Self {
            core,
            cfg,
            last_df: 0.0,
            last_d: 0.0,
            last_ep: 0.0,
            last_ed: 0.0,
        }
    }

    pub fn core(&self) -> &PidController {
        &self.core
    }

    pub fn config(&self) -> &AdvancedConfig {
        &self.cfg
    }

    /// Replace the toggle set; clears filter memory and core history.
    pub fn configure(&mut self, cfg: AdvancedConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        self.cfg = cfg;
        self.reset();
        Ok(())
    }

    /// Replace the core's gains; clears all history.
    pub fn apply(&mut self, cfg: CompensatorConfig) -> Result<(), ConfigError> {
        self.core.apply(cfg)?;
        self.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.core.reset();
        self.last_df = 0.0;
        self.last_d = 0.0;
        self.last_ep = 0.0;
        self.last_ed = 0.0;
    }

    /// One step.  `error` is `setpoint − measurement` and is replaced by the
    /// weighted error when setpoint weighting is on.
    pub fn update(&mut self, error: f32, setpoint: f32, measurement: f32, dt: f32) -> f32 {
        let cfg = self.cfg;

        let (ep, ed) = if cfg.setpoint_weighting {
            (cfg.beta * setpoint - measurement, cfg.gamma * setpoint - measurement)
        } else {
            (error, error)
        };
        self.last_ep = ep;
        self.last_ed = ed;

        let mut u = self.core.update(ep, dt);

        if cfg.anti_windup {
            let raw = self.core.last_unsaturated();
            let CompensatorConfig { umin, umax, .. } = *self.core.config();
            if raw > umax {
                self.core.unwind_integral(-(raw - umax) * cfg.tt);
            } else if raw < umin {
                self.core.unwind_integral(-(raw - umin) * cfg.tt);
            }
        }

        self.last_d = self.core.last_d();
        if cfg.derivative_filter {
            let td = self.core.config().td;
            let denom = td + cfg.n * dt;
            let alpha = if denom > 0.0 { td / denom } else { 0.0 };
            self.last_df = alpha * self.last_df + (1.0 - alpha) * self.core.last_d();
            self.last_d = self.last_df;
            u = self.core.last_p() + self.core.last_i() + self.last_df;
        }

        if cfg.feed_forward {
            u += cfg.kff * setpoint;
        }

        u
    }

    /// `(P, I, D)` of the last update, with D after filtering.
    pub fn contributions(&self) -> (f32, f32, f32) {
        (self.core.last_p(), self.core.last_i(), self.last_d)
    }

    /// `(eP, eD)` of the last update.
    pub fn weighted_errors(&self) -> (f32, f32) {
        (self.last_ep, self.last_ed)
    }
}
