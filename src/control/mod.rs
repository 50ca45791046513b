//! Control core: compensator, advanced layer, autotune and the position loop.
//!
//! Everything here is pure logic.  Hardware is reached only through the
//! [`SensorPort`](crate::app::ports::SensorPort) and
//! [`ActuatorPort`](crate::app::ports::ActuatorPort) traits.
//!
//! ```text
//! Sensor ─▶ e = r − y ─▶ PID (+ advanced) ─▶ saturate ─▶ µs mapping ─▶ Actuator
//! ```

pub mod advanced;
pub mod autotune;
pub mod pid;
pub mod position;
pub mod servo;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use advanced::AdvancedConfig;
use pid::CompensatorForm;

/// Clamp a measured tick interval into `[0, max_dt]`.
///
/// Callers apply this before handing `dt` to any stateful update so a stall
/// (debugger, scheduler hiccup) cannot spike the derivative or dump a large
/// slug into the integral.  NaN maps to zero.
pub fn clamp_dt(dt: f32, max_dt: f32) -> f32 {
    if dt.is_nan() || dt <= 0.0 {
        0.0
    } else if dt > max_dt {
        max_dt
    } else {
        dt
    }
}

// ───────────────────────────────────────────────────────────────
// Gains
// ───────────────────────────────────────────────────────────────

/// The three numbers the command surface sets, read by the active form as
/// Parallel `(Kp, Ki, Kd)`, Ideal `(K, Ti, Td)` or Series `(Kp, Ti, Td)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    pub gain: f32,
    pub integral: f32,
    pub derivative: f32,
}

impl Gains {
    pub const fn new(gain: f32, integral: f32, derivative: f32) -> Self {
        Self {
            gain,
            integral,
            derivative,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

/// Which backend the controller is driving.  Surfaced verbatim in the status
/// so a degraded start is never hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendMode {
    /// Real ADC + PWM over I2C.
    #[serde(rename = "HW")]
    Hardware,
    /// Hardware probe failed; running on the simulated rig.
    #[serde(rename = "DUMMY")]
    Dummy,
    /// Simulation requested explicitly.
    #[serde(rename = "SIM")]
    Simulated,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => write!(f, "HW"),
            Self::Dummy => write!(f, "DUMMY"),
            Self::Simulated => write!(f, "SIM"),
        }
    }
}

/// Read-only snapshot of the last completed tick.
///
/// Consumers that need history must copy; the loop keeps only the latest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlLoopStatus {
    pub raw: i32,
    pub measurement: f32,
    pub setpoint: f32,
    pub output: f32,
    pub pulse_us: u16,
    pub p: f32,
    pub i: f32,
    pub d: f32,
    pub mode: BackendMode,
    pub saturated: bool,
    pub running: bool,
    pub manual: bool,
}

// ───────────────────────────────────────────────────────────────
// Controller capability
// ───────────────────────────────────────────────────────────────

/// The controller surface every backend variant provides.
///
/// Selected once at startup (hardware-backed or simulated) and then driven
/// by [`AppService`](crate::app::service::AppService) and the autotune
/// engine without knowing which variant is underneath.
pub trait Controller {
    /// Enable automatic regulation (clears transient compensator state).
    fn start(&mut self);

    /// Disable regulation, clear transient state and de-energise the servo.
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    /// Clamped to `[0, 1]`; takes effect on the next tick.
    fn set_setpoint(&mut self, setpoint: f32);

    fn setpoint(&self) -> f32;

    /// Replace the gains of the active form and reset transient state.
    fn set_gains(&mut self, gains: Gains) -> Result<()>;

    /// The gains the user last applied (before any I/D disabling).
    fn gains(&self) -> Gains;

    /// Switch compensator form, loading that form's stored gains.
    fn set_form(&mut self, form: CompensatorForm) -> Result<()>;

    fn form(&self) -> CompensatorForm;

    /// Zero the integral parameter while `disabled` is set; resets transient
    /// state.
    fn disable_integral(&mut self, disabled: bool) -> Result<()>;

    /// Zero the derivative parameter while `disabled` is set; resets
    /// transient state.
    fn disable_derivative(&mut self, disabled: bool) -> Result<()>;

    fn set_advanced(&mut self, cfg: AdvancedConfig) -> Result<()>;

    fn advanced(&self) -> AdvancedConfig;

    /// Enter or leave manual servo mode.
    ///
    /// Entering suspends regulation; leaving resumes it on the next tick if
    /// it was running when manual mode was entered.
    fn enable_manual(&mut self, manual: bool);

    fn is_manual(&self) -> bool;

    /// Command a normalized servo position; ignored unless in manual mode.
    fn set_manual_position(&mut self, position: f32) -> Result<()>;

    /// Last commanded servo position mapped back to `[0, 1]`.
    fn servo_position(&self) -> f32;

    /// Fresh sensor read, normalized to `[0, 1]`.
    fn read_position(&mut self) -> Result<f32>;

    /// One control cycle; `dt` must already be clamped by the caller.
    ///
    /// Stopped: only simulated time advances.  Manual: the sensor is sampled
    /// into the status but nothing is commanded.
    fn tick(&mut self, dt: f32) -> Result<()>;

    fn status(&self) -> ControlLoopStatus;
}
