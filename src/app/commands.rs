//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (operator
//! console, display, script) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::control::Gains;
use crate::control::advanced::AdvancedConfig;
use crate::control::autotune::AutotuneConfig;
use crate::control::pid::CompensatorForm;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Begin regulation (leaves manual mode).
    Start,

    /// End regulation and de-energise the servo.  Also cancels a running
    /// autotune session.
    Stop,

    /// Normalized setpoint, clamped to `[0, 1]`.
    SetSetpoint(f32),

    /// Three numbers read by the active compensator form.
    SetGains(Gains),

    SetForm(CompensatorForm),

    DisableIntegral(bool),

    DisableDerivative(bool),

    ConfigureAdvanced(AdvancedConfig),

    EnableManual(bool),

    /// Normalized servo position; ignored outside manual mode.
    SetManualPosition(f32),

    StartAutotune(AutotuneConfig),

    CancelAutotune,

    /// Load the last successful autotune result as parallel-form gains.
    ApplyTunedGains,
}

impl AppCommand {
    /// Whether the command may run while an autotune session owns the rig.
    pub fn allowed_during_autotune(&self) -> bool {
        matches!(self, Self::Stop | Self::CancelAutotune)
    }
}
