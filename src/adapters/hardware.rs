//! Hardware adapter: bridges the real rig to the domain port traits.
//!
//! Owns the ADS1x15 position ADC and the PCA9685 servo PWM, exposing them
//! through [`SensorPort`] and [`ActuatorPort`].  This is the only module
//! that touches actual hardware.  Generic over the `embedded-hal` bus and
//! delay so it runs on any I2C implementation (Linux `/dev/i2c-N` with the
//! `rpi` feature, a fake bus in tests).

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::info;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::SystemConfig;
use crate::drivers::ads1x15::Ads1x15;
use crate::drivers::pca9685::Pca9685;
use crate::error::Result;

/// Concrete adapter that combines the ADC and PWM behind port traits.
pub struct HardwareAdapter<I2C, D> {
    adc: Ads1x15<I2C, D>,
    pwm: Pca9685<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> HardwareAdapter<I2C, D> {
    /// Bring up both chips and leave the servo de-energised.
    ///
    /// Any bus error here means the rig is absent; the caller decides
    /// whether to fall back to the simulated rig.
    pub fn probe(adc_bus: (I2C, D), pwm_bus: (I2C, D), config: &SystemConfig) -> Result<Self> {
        let (pwm_i2c, pwm_delay) = pwm_bus;
        let mut pwm =
            Pca9685::new(pwm_i2c, pwm_delay, config.pwm.address, config.pwm.frequency_hz)?;
        pwm.servo_off(config.pwm.channel)?;

        let (adc_i2c, adc_delay) = adc_bus;
        let mut adc = Ads1x15::new(adc_i2c, adc_delay, config.adc.address, config.adc.model);
        let cfg_reg = adc.probe()?;

        info!(
            "hardware: PCA9685@0x{:02X} {} Hz, {:?}@0x{:02X} (config 0x{:04X})",
            config.pwm.address,
            config.pwm.frequency_hz,
            config.adc.model,
            config.adc.address,
            cfg_reg
        );
        Ok(Self { adc, pwm })
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I2C: I2c, D: DelayNs> SensorPort for HardwareAdapter<I2C, D> {
    fn read_raw(&mut self, channel: u8) -> Result<i32> {
        self.adc.read_raw(channel)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I2C: I2c, D: DelayNs> ActuatorPort for HardwareAdapter<I2C, D> {
    fn set_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        self.pwm.set_pulse_us(channel, pulse_us)
    }

    fn disable(&mut self, channel: u8) -> Result<()> {
        self.pwm.servo_off(channel)
    }
}
