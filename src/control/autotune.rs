//! Relay (Åström–Hägglund) autotune with Ziegler–Nichols gains.
//!
//! The session is a small state machine stepped once per control tick, so
//! it never blocks and can be cancelled between any two steps:
//!
//! ```text
//!  Idle ──begin()──▶ Running ──step()…──▶ Succeeded | Failed
//!                       │
//!                       └──hardware error──▶ Aborted
//! ```
//!
//! While running, the controller is held in manual mode and the servo is
//! driven to `0.5 ± A` depending on which side of the setpoint the ball is.
//! Every relay switch records a [`Peak`]: the switch time and the extreme
//! measurement of the half cycle that just ended.  The first half cycle is
//! incomplete, so its peak is left out.  Over the remaining `n` peaks two
//! switches make one period, so
//!
//! ```text
//! Pu = 2 · (t_last − t_first) / (n − 1)
//! Ku = 4A / (π · (max(peak) − min(peak)))
//! Kp = 0.6·Ku   Ki = 2·Kp / Pu   Kd = Kp·Pu / 8
//! ```
//!
//! Step-response and Cohen–Coon methods are recognised but end with
//! [`AutotuneFailure::NotImplemented`] without touching the rig.

use core::f32::consts::PI;
use core::fmt;
use core::str::FromStr;

use heapless::Vec as PeakVec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

use super::Controller;

/// Relay switches collected before the session ends.
pub const MAX_PEAKS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutotuneMethod {
    #[default]
    ZnRelay,
    ZnStep,
    CohenCoon,
}

impl FromStr for AutotuneMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zn_relay" => Ok(Self::ZnRelay),
            "zn_step" => Ok(Self::ZnStep),
            "cohen_coon" => Ok(Self::CohenCoon),
            _ => Err(ConfigError::UnknownMethod),
        }
    }
}

impl fmt::Display for AutotuneMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZnRelay => write!(f, "zn_relay"),
            Self::ZnStep => write!(f, "zn_step"),
            Self::CohenCoon => write!(f, "cohen_coon"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotuneConfig {
    pub method: AutotuneMethod,
    /// Relay amplitude in normalized servo units.
    pub amplitude: f32,
    /// Seconds between samples.
    pub sample_time: f32,
    /// Session timeout in seconds.
    pub max_duration: f32,
}

impl Default for AutotuneConfig {
    fn default() -> Self {
        Self {
            method: AutotuneMethod::ZnRelay,
            amplitude: 0.1,
            sample_time: 0.02,
            max_duration: 10.0,
        }
    }
}

impl AutotuneConfig {
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if !(self.amplitude > 0.0 && self.amplitude <= 0.5) {
            return Err(ConfigError::ValidationFailed("autotune amplitude outside (0, 0.5]"));
        }
        if !(self.sample_time.is_finite() && self.sample_time > 0.0) {
            return Err(ConfigError::ValidationFailed("autotune sample_time must be > 0"));
        }
        if !(self.max_duration.is_finite() && self.max_duration > 0.0) {
            return Err(ConfigError::ValidationFailed("autotune max_duration must be > 0"));
        }
        Ok(())
    }
}

/// One collected sample: seconds since the session began, measurement and
/// relay output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuneSample {
    pub t: f32,
    pub measurement: f32,
    pub output: f32,
}

/// A relay switch: when it happened and the extreme of the half cycle it
/// closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub t: f32,
    pub measurement: f32,
}

/// Identified plant parameters and the derived parallel-form gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunedGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub ku: f32,
    pub pu: f32,
}

/// Expected negative outcomes.  Not errors: the session ran correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutotuneFailure {
    /// Fewer than two relay switches before the timeout.
    NoOscillation,
    /// Switches were seen but the peaks carry no amplitude or period.
    FlatResponse,
    NotImplemented(AutotuneMethod),
    Cancelled,
}

impl fmt::Display for AutotuneFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOscillation => write!(f, "no oscillation found"),
            Self::FlatResponse => write!(f, "oscillation has no measurable amplitude"),
            Self::NotImplemented(m) => write!(f, "method {m} not implemented"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one session.  The sample series belongs to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum AutotuneResult {
    Success {
        gains: TunedGains,
        samples: Vec<TuneSample>,
    },
    Failure {
        reason: AutotuneFailure,
        samples: Vec<TuneSample>,
    },
}

impl AutotuneResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn gains(&self) -> Option<TunedGains> {
        match self {
            Self::Success { gains, .. } => Some(*gains),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<AutotuneFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(*reason),
        }
    }

    /// Gains or the failure reason, without the samples.
    pub fn outcome(&self) -> core::result::Result<TunedGains, AutotuneFailure> {
        match self {
            Self::Success { gains, .. } => Ok(*gains),
            Self::Failure { reason, .. } => Err(*reason),
        }
    }

    pub fn samples(&self) -> &[TuneSample] {
        match self {
            Self::Success { samples, .. } | Self::Failure { samples, .. } => samples,
        }
    }
}

impl fmt::Display for AutotuneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { gains, .. } => write!(
                f,
                "OK Kp={:.4} Ki={:.4} Kd={:.4} (Ku={:.4} Pu={:.3}s)",
                gains.kp, gains.ki, gains.kd, gains.ku, gains.pu
            ),
            Self::Failure { reason, .. } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Succeeded,
    Failed,
    /// Ended by a sensor or actuator error.
    Aborted,
}

/// Zero-length peak spread or period.
const MIN_SPREAD: f32 = 1e-6;

/// Ziegler–Nichols gains from a list of relay switches.
///
/// The first switch closes the half cycle the session started in, which is
/// usually a transient, so only the switches after it are measured.  At
/// least two of those are needed.
pub fn identify(
    amplitude: f32,
    peaks: &[Peak],
) -> core::result::Result<TunedGains, AutotuneFailure> {
    let complete = peaks.get(1..).unwrap_or_default();
    let (first, last) = match (complete.first(), complete.last()) {
        (Some(f), Some(l)) if complete.len() >= 2 => (f, l),
        _ => return Err(AutotuneFailure::NoOscillation),
    };

    let pu = 2.0 * (last.t - first.t) / (complete.len() - 1) as f32;
    let hi = complete.iter().map(|p| p.measurement).fold(f32::MIN, f32::max);
    let lo = complete.iter().map(|p| p.measurement).fold(f32::MAX, f32::min);
    let spread = hi - lo;
    if pu < MIN_SPREAD || spread < MIN_SPREAD {
        return Err(AutotuneFailure::FlatResponse);
    }

    let ku = 4.0 * amplitude / (PI * spread);
    let kp = 0.6 * ku;
    Ok(TunedGains {
        kp,
        ki: 2.0 * kp / pu,
        kd: kp * pu / 8.0,
        ku,
        pu,
    })
}

/// One resumable tuning session.  All progress lives here, so stepping can
/// stop at any tick and pick up again.
pub struct AutotuneSession {
    cfg: AutotuneConfig,
    state: SessionState,
    started_at: Option<f32>,
    next_sample: f32,
    peaks: PeakVec<Peak, MAX_PEAKS>,
    samples: Vec<TuneSample>,
    last_above: Option<bool>,
    /// Extreme measurement of the current half cycle.
    extreme: f32,
}

impl AutotuneSession {
    pub fn new(cfg: AutotuneConfig) -> core::result::Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            state: SessionState::Idle,
            started_at: None,
            next_sample: 0.0,
            peaks: PeakVec::new(),
            samples: Vec::new(),
            last_above: None,
            extreme: 0.0,
        })
    }

    pub fn config(&self) -> &AutotuneConfig {
        &self.cfg
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Take the rig.  Unimplemented methods finish here with a structured
    /// failure and leave the controller untouched.
    pub fn begin<C: Controller + ?Sized>(
        &mut self,
        ctrl: &mut C,
    ) -> Result<Option<AutotuneResult>> {
        if self.state != SessionState::Idle {
            return Ok(None);
        }
        match self.cfg.method {
            AutotuneMethod::ZnRelay => {}
            method @ (AutotuneMethod::ZnStep | AutotuneMethod::CohenCoon) => {
                warn!("autotune method {method} is not implemented");
                self.state = SessionState::Failed;
                return Ok(Some(self.fail(AutotuneFailure::NotImplemented(method))));
            }
        }

        info!(
            "autotune: relay test A={} around setpoint {:.3}",
            self.cfg.amplitude,
            ctrl.setpoint()
        );
        ctrl.enable_manual(true);
        self.state = SessionState::Running;
        if let Err(e) = ctrl.set_manual_position(0.5) {
            self.abort(ctrl);
            return Err(e);
        }
        Ok(None)
    }

    /// Advance the session to time `t` (seconds on any monotonic clock).
    ///
    /// Returns the result once the session ends.  A hardware error aborts
    /// the session, hands the controller back and is returned as-is.
    pub fn step<C: Controller + ?Sized>(
        &mut self,
        ctrl: &mut C,
        t: f32,
    ) -> Result<Option<AutotuneResult>> {
        if self.state != SessionState::Running {
            return Ok(None);
        }
        let t0 = *self.started_at.get_or_insert(t);
        let elapsed = t - t0;

        if elapsed >= self.cfg.max_duration {
            return Ok(Some(self.finish(ctrl)));
        }
        // tolerate accumulated clock rounding
        if elapsed + 0.01 * self.cfg.sample_time < self.next_sample {
            return Ok(None);
        }
        self.next_sample = elapsed + self.cfg.sample_time;

        let measurement = match ctrl.read_position() {
            Ok(y) => y,
            Err(e) => {
                self.abort(ctrl);
                return Err(e);
            }
        };
        let above = measurement > ctrl.setpoint();
        let output = if above { -self.cfg.amplitude } else { self.cfg.amplitude };
        if let Err(e) = ctrl.set_manual_position(0.5 + output) {
            self.abort(ctrl);
            return Err(e);
        }

        match self.last_above {
            Some(prev) if prev != above => {
                let peak = Peak {
                    t: elapsed,
                    measurement: self.extreme,
                };
                self.extreme = measurement;
                if self.peaks.push(peak).is_err() || self.peaks.is_full() {
                    self.record(elapsed, measurement, output);
                    self.last_above = Some(above);
                    return Ok(Some(self.finish(ctrl)));
                }
            }
            Some(_) => {
                self.extreme = if above {
                    self.extreme.max(measurement)
                } else {
                    self.extreme.min(measurement)
                };
            }
            None => self.extreme = measurement,
        }
        self.last_above = Some(above);
        self.record(elapsed, measurement, output);
        Ok(None)
    }

    /// Stop a running session within the current step.
    pub fn cancel<C: Controller + ?Sized>(&mut self, ctrl: &mut C) -> Option<AutotuneResult> {
        if self.state != SessionState::Running {
            return None;
        }
        info!("autotune cancelled");
        ctrl.enable_manual(false);
        self.state = SessionState::Failed;
        Some(self.fail(AutotuneFailure::Cancelled))
    }

    fn record(&mut self, t: f32, measurement: f32, output: f32) {
        self.samples.push(TuneSample { t, measurement, output });
    }

    fn finish<C: Controller + ?Sized>(&mut self, ctrl: &mut C) -> AutotuneResult {
        ctrl.enable_manual(false);
        match identify(self.cfg.amplitude, &self.peaks) {
            Ok(gains) => {
                self.state = SessionState::Succeeded;
                info!(
                    "autotune: Ku={:.4} Pu={:.3}s -> Kp={:.4} Ki={:.4} Kd={:.4}",
                    gains.ku, gains.pu, gains.kp, gains.ki, gains.kd
                );
                AutotuneResult::Success {
                    gains,
                    samples: core::mem::take(&mut self.samples),
                }
            }
            Err(reason) => {
                self.state = SessionState::Failed;
                warn!("autotune failed: {reason} ({} switches)", self.peaks.len());
                self.fail(reason)
            }
        }
    }

    fn fail(&mut self, reason: AutotuneFailure) -> AutotuneResult {
        AutotuneResult::Failure {
            reason,
            samples: core::mem::take(&mut self.samples),
        }
    }

    /// End the session after a hardware error and hand the controller back.
    pub fn abort<C: Controller + ?Sized>(&mut self, ctrl: &mut C) {
        warn!("autotune aborted by hardware error");
        ctrl.enable_manual(false);
        self.state = SessionState::Aborted;
    }
}
