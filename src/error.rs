//! Unified error types for the Balltrack controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! caller of `tick()` and the command handlers uniform.  All variants are
//! `Copy` so a failed tick can be reported through the event sink and still
//! returned to the caller without allocation.
//!
//! Expected negative outcomes of an autotune session are *not* errors; they
//! are carried by [`AutotuneResult`](crate::control::autotune::AutotuneResult).

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The position sensor could not be read.
    Sensor(SensorError),
    /// The servo actuator rejected a command.
    Actuator(ActuatorError),
    /// A supplied value is invalid; reported at the call that supplied it.
    Config(ConfigError),
    /// The command would interleave with a running autotune session.
    Busy,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Busy => write!(f, "autotune session in progress"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for bus/transaction failures (as opposed to bad input).
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Sensor(_) | Self::Actuator(_))
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I2C transaction with the ADC failed.
    Bus(ErrorKind),
    /// The backend is not connected (probe never succeeded).
    Offline,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "ADC bus error ({kind})"),
            Self::Offline => write!(f, "ADC offline"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// I2C transaction with the PWM chip failed.
    Bus(ErrorKind),
    /// The backend is not connected (probe never succeeded).
    Offline,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "PWM bus error ({kind})"),
            Self::Offline => write!(f, "PWM offline"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Invalid values supplied through configuration or the command surface.
/// Never silently substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Channel selector outside the device's range.
    InvalidChannel(u8),
    /// Compensator form selector not one of parallel / ideal / series.
    UnknownForm,
    /// Autotune method selector not recognised.
    UnknownMethod,
    /// A time constant that must be `>= 0` was negative (field name).
    NegativeTimeConstant(&'static str),
    /// Derivative filter ratio `N` must be strictly positive.
    NonPositiveFilterRatio,
    /// `umin > umax`, or a bound is not finite.
    InvalidOutputBounds,
    /// ADC full-scale resolution must be non-zero.
    InvalidResolution,
    /// Servo pulse bounds must satisfy `min < max`.
    InvalidPulseRange,
    /// A field failed range validation (field name and reason).
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "invalid channel {ch}"),
            Self::UnknownForm => write!(f, "unknown compensator form"),
            Self::UnknownMethod => write!(f, "unknown autotune method"),
            Self::NegativeTimeConstant(name) => write!(f, "time constant {name} must be >= 0"),
            Self::NonPositiveFilterRatio => write!(f, "derivative filter ratio N must be > 0"),
            Self::InvalidOutputBounds => write!(f, "output bounds must satisfy umin <= umax"),
            Self::InvalidResolution => write!(f, "ADC resolution must be > 0"),
            Self::InvalidPulseRange => write!(f, "pulse bounds must satisfy min < max"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
