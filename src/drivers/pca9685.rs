//! PCA9685 16-channel PWM driver, used for one hobby servo.
//!
//! Init: ALLCALL, wake from sleep, then set the prescaler (which the chip
//! only accepts while sleeping) and restart.  Pulses are given in
//! microseconds and converted to 12-bit on-counts within one PWM period.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};

use crate::error::{ActuatorError, ConfigError, Result};

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const LED0_ON_L: u8 = 0x06;

const MODE1_RESTART: u8 = 0x80;
const MODE1_SLEEP: u8 = 0x10;
const MODE1_ALLCALL: u8 = 0x01;

const OSC_HZ: f32 = 25_000_000.0;
const COUNTS: f32 = 4096.0;
/// Oscillator settle time after leaving sleep.
const WAKE_US: u32 = 5_000;

pub const CHANNELS: u8 = 16;

/// Prescaler register value for `freq_hz`: `round(25 MHz / (4096·f)) − 1`.
pub fn prescale_for(freq_hz: u16) -> u8 {
    let value = (OSC_HZ / (COUNTS * f32::from(freq_hz.max(1)))).round() - 1.0;
    value.clamp(3.0, 255.0) as u8
}

pub struct Pca9685<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    freq_hz: u16,
}

impl<I2C: I2c, D: DelayNs> Pca9685<I2C, D> {
    /// Reset the chip and program `freq_hz`.  Fails if the chip does not
    /// answer, which doubles as the presence probe.
    pub fn new(i2c: I2C, delay: D, address: u8, freq_hz: u16) -> Result<Self> {
        let mut pwm = Self {
            i2c,
            delay,
            address,
            freq_hz,
        };
        pwm.write_reg(MODE1, MODE1_ALLCALL)?;
        pwm.delay.delay_us(WAKE_US);
        let mode1 = pwm.read_reg(MODE1)? & !MODE1_SLEEP;
        pwm.write_reg(MODE1, mode1)?;
        pwm.delay.delay_us(WAKE_US);
        pwm.set_frequency(freq_hz)?;
        Ok(pwm)
    }

    pub fn frequency(&self) -> u16 {
        self.freq_hz
    }

    pub fn set_frequency(&mut self, freq_hz: u16) -> Result<()> {
        let old = self.read_reg(MODE1)?;
        self.write_reg(MODE1, (old & !MODE1_RESTART) | MODE1_SLEEP)?;
        self.write_reg(PRESCALE, prescale_for(freq_hz))?;
        self.write_reg(MODE1, old)?;
        self.delay.delay_us(WAKE_US);
        self.write_reg(MODE1, old | MODE1_RESTART)?;
        self.freq_hz = freq_hz;
        Ok(())
    }

    /// On-count for a pulse of `pulse_us` at the current frequency.
    pub fn counts_for(&self, pulse_us: u16) -> u16 {
        let period_us = 1_000_000.0 / f32::from(self.freq_hz.max(1));
        let counts = f32::from(pulse_us) * COUNTS / period_us;
        (counts as u16) & 0x0FFF
    }

    /// Pulse starts at count 0 and ends at the computed on-count.
    pub fn set_pulse_us(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        let off = self.counts_for(pulse_us);
        let [off_h, off_l] = off.to_be_bytes();
        self.write_channel(channel, [0, 0, off_l, off_h])
    }

    /// No pulse at all on `channel`.
    pub fn servo_off(&mut self, channel: u8) -> Result<()> {
        self.write_channel(channel, [0; 4])
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    fn write_channel(&mut self, channel: u8, regs: [u8; 4]) -> Result<()> {
        if channel >= CHANNELS {
            return Err(ConfigError::InvalidChannel(channel).into());
        }
        let base = LED0_ON_L + 4 * channel;
        for (offset, value) in (0u8..).zip(regs) {
            self.write_reg(base + offset, value)?;
        }
        Ok(())
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|e| ActuatorError::Bus(e.kind()))?;
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|e| ActuatorError::Bus(e.kind()))?;
        Ok(buf[0])
    }
}
