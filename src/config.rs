//! System configuration parameters
//!
//! All tunable parameters for the Balltrack rig.  Read once at construction;
//! only setpoint, gains, form and the advanced toggles change afterwards, and
//! only through explicit commands.

use serde::{Deserialize, Serialize};

use crate::control::Gains;
use crate::control::advanced::AdvancedConfig;
use crate::control::autotune::AutotuneConfig;
use crate::control::pid::{CompensatorConfig, CompensatorForm};
use crate::control::servo::PulseRange;
use crate::error::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub pwm: PwmConfig,
    pub adc: AdcConfig,
    pub pid: PidDefaults,
    pub autotune: AutotuneConfig,

    /// Normalized setpoint applied at startup.
    pub default_setpoint: f32,

    // --- Timing ---
    /// Control loop period (milliseconds)
    pub tick_period_ms: u32,
    /// Upper clamp for a measured tick interval (seconds)
    pub max_dt_secs: f32,
    /// Ticks between telemetry events; 0 disables telemetry
    pub telemetry_interval_ticks: u32,

    /// Skip the hardware probe and run on the simulated rig.
    pub simulate: bool,
}

/// PCA9685 servo output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    pub i2c_bus: u8,
    pub address: u8,
    /// PWM frequency in Hz
    pub frequency_hz: u16,
    pub channel: u8,
    pub min_pulse_us: u16,
    pub max_pulse_us: u16,
}

/// Supported ADS1x15 variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdcModel {
    /// 12-bit, 1600 SPS default.
    #[default]
    #[serde(rename = "ADS1015")]
    Ads1015,
    /// 16-bit, 128 SPS default.
    #[serde(rename = "ADS1115")]
    Ads1115,
}

/// Position sensor ADC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcConfig {
    pub i2c_bus: u8,
    pub address: u8,
    pub channel: u8,
    pub model: AdcModel,
    /// Raw count that maps to a normalized measurement of 1.0
    pub resolution: u32,
}

/// Compensator defaults for every form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidDefaults {
    pub form: CompensatorForm,
    /// (Kp, Ki, Kd)
    pub parallel: Gains,
    /// (K, Ti, Td)
    pub ideal: Gains,
    /// (Kp, Ti, Td)
    pub series: Gains,
    pub umin: f32,
    pub umax: f32,
    pub advanced: AdvancedConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pwm: PwmConfig::default(),
            adc: AdcConfig::default(),
            pid: PidDefaults::default(),
            autotune: AutotuneConfig::default(),

            default_setpoint: 0.5,

            // Timing
            tick_period_ms: 20, // 50 Hz
            max_dt_secs: 0.2,
            telemetry_interval_ticks: 50, // 1/s at 50 Hz

            simulate: false,
        }
    }
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            address: 0x40,
            frequency_hz: 50,
            channel: 0,
            min_pulse_us: 1000,
            max_pulse_us: 2000,
        }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            address: 0x48,
            channel: 0,
            model: AdcModel::Ads1015,
            resolution: AdcModel::Ads1015.full_scale(),
        }
    }
}

impl Default for PidDefaults {
    fn default() -> Self {
        Self {
            form: CompensatorForm::Parallel,
            parallel: Gains::new(2.0, 0.0, 0.0),
            ideal: Gains::new(2.0, 0.0, 0.0),
            series: Gains::new(2.0, 0.0, 0.0),
            umin: -1.0,
            umax: 1.0,
            advanced: AdvancedConfig::default(),
        }
    }
}

impl PidDefaults {
    pub fn gains_for(&self, form: CompensatorForm) -> Gains {
        match form {
            CompensatorForm::Parallel => self.parallel,
            CompensatorForm::Ideal => self.ideal,
            CompensatorForm::Series => self.series,
        }
    }

    pub fn compensator(&self, form: CompensatorForm) -> CompensatorConfig {
        CompensatorConfig::from_gains(form, self.gains_for(form), self.umin, self.umax)
    }
}

impl AdcModel {
    /// Largest positive single-ended reading.
    pub const fn full_scale(self) -> u32 {
        match self {
            Self::Ads1015 => 2047,
            Self::Ads1115 => 32767,
        }
    }
}

impl PwmConfig {
    pub fn pulse_range(&self) -> Result<PulseRange, ConfigError> {
        PulseRange::new(self.min_pulse_us, self.max_pulse_us)
    }
}

impl SystemConfig {
    /// Reject out-of-range values.  Nothing is clamped or substituted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pwm.channel > 15 {
            return Err(ConfigError::InvalidChannel(self.pwm.channel));
        }
        if self.pwm.address > 0x7F || self.adc.address > 0x7F {
            return Err(ConfigError::ValidationFailed("I2C address must be 7-bit"));
        }
        if !(24..=1526).contains(&self.pwm.frequency_hz) {
            return Err(ConfigError::ValidationFailed("pwm.frequency_hz outside 24..=1526"));
        }
        self.pwm.pulse_range()?;
        if u32::from(self.pwm.max_pulse_us) * u32::from(self.pwm.frequency_hz) >= 1_000_000 {
            return Err(ConfigError::ValidationFailed("pwm.max_pulse_us exceeds one period"));
        }

        if self.adc.channel > 3 {
            return Err(ConfigError::InvalidChannel(self.adc.channel));
        }
        if self.adc.resolution == 0 {
            return Err(ConfigError::InvalidResolution);
        }

        for form in [CompensatorForm::Parallel, CompensatorForm::Ideal, CompensatorForm::Series] {
            self.pid.compensator(form).validate()?;
        }
        self.pid.advanced.validate()?;
        self.autotune.validate()?;

        if !(0.0..=1.0).contains(&self.default_setpoint) {
            return Err(ConfigError::ValidationFailed("default_setpoint outside [0, 1]"));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_period_ms must be > 0"));
        }
        if !self.max_dt_secs.is_finite() || self.max_dt_secs <= 0.0 {
            return Err(ConfigError::ValidationFailed("max_dt_secs must be > 0"));
        }
        Ok(())
    }

    /// Nominal tick interval in seconds.
    pub fn tick_period_secs(&self) -> f32 {
        self.tick_period_ms as f32 / 1000.0
    }
}
