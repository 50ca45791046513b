//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, keep a recent history for a
//! display, or record them in a test.

use crate::control::advanced::AdvancedConfig;
use crate::control::autotune::{AutotuneFailure, AutotuneMethod, TunedGains};
use crate::control::pid::CompensatorForm;
use crate::control::{ControlLoopStatus, Gains};
use crate::error::Error;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppEvent {
    /// Regulation started.
    Started { setpoint: f32 },

    /// Regulation stopped and the servo de-energised.
    Stopped,

    SetpointChanged(f32),

    /// Gains, form or a disable flag changed; carries what is now active.
    GainsApplied { form: CompensatorForm, gains: Gains },

    AdvancedChanged(AdvancedConfig),

    /// Manual servo mode entered (`true`) or left.
    ModeChanged { manual: bool },

    AutotuneStarted(AutotuneMethod),

    /// A session ended normally, with gains or a structured reason.
    AutotuneFinished(Result<TunedGains, AutotuneFailure>),

    /// A session ended on a sensor or actuator error.
    AutotuneAborted(Error),

    /// Periodic status snapshot.
    Telemetry(ControlLoopStatus),

    /// A control tick failed; the loop keeps its last good status.
    TickFailed(Error),
}
