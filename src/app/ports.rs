//! Port traits: the hexagonal boundary between control logic and the rig.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PositionLoop / AppService (domain)
//! ```
//!
//! Driven adapters (ADC, PWM chip, simulated plant, event sinks) implement
//! these traits.  [`PositionLoop`](crate::control::position::PositionLoop)
//! consumes them via generics, so the control core never touches a bus.
//!
//! All port errors are the crate [`Error`](crate::error::Error); the core
//! never retries a failed transaction.

use crate::error::Result;

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain a position sample.
pub trait SensorPort {
    /// One raw conversion on `channel`.
    ///
    /// Signedness and full scale depend on the backend; the resolution is
    /// supplied by configuration, never discovered here.  Fails with
    /// [`Error::Sensor`](crate::error::Error::Sensor) on a bus fault and
    /// [`Error::Config`](crate::error::Error::Config) on a bad channel.
    fn read_raw(&mut self, channel: u8) -> Result<i32>;

    /// Advance simulated time by `dt` seconds.
    ///
    /// Physical backends have nothing to do; the simulated rig integrates
    /// its plant here.
    fn advance(&mut self, _dt: f32) {}
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to command the servo.
pub trait ActuatorPort {
    /// Drive `channel` with a pulse of `pulse_us` microseconds.
    ///
    /// The value is already clamped to the configured physical bounds.
    fn set_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()>;

    /// De-energise `channel` (no pulse at all).
    fn disable(&mut self, channel: u8) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.  Adapters
/// decide where they go (log facade, recent-event history, test recorder).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
