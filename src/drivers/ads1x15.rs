//! ADS1015 / ADS1115 single-ended ADC driver.
//!
//! Single-shot conversions at PGA ±4.096 V with the comparator disabled.
//! Each read writes the config register with OS set, waits one conversion
//! time and reads the conversion register back (big-endian).
//!
//! | Model   | Data rate | Wait  | Result                     |
//! |---------|-----------|-------|----------------------------|
//! | ADS1015 | 1600 SPS  | 2 ms  | 12-bit, left-justified     |
//! | ADS1115 | 128 SPS   | 10 ms | 16-bit two's complement    |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, I2c};

use crate::config::AdcModel;
use crate::error::{ConfigError, Result, SensorError};

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

const OS_START: u16 = 1 << 15;
const MUX_SHIFT: u16 = 12;
/// AINx vs GND occupies MUX codes 0b100..=0b111.
const MUX_SINGLE_BASE: u16 = 0b100;
const PGA_4V096: u16 = 0b001 << 9;
const MODE_SINGLE_SHOT: u16 = 1 << 8;
/// 1600 SPS on the ADS1015, 128 SPS on the ADS1115.
const DR_DEFAULT: u16 = 0b100 << 5;
const COMP_QUE_DISABLE: u16 = 0b11;

const BASE_CONFIG: u16 = MODE_SINGLE_SHOT | PGA_4V096 | DR_DEFAULT | COMP_QUE_DISABLE;

impl AdcModel {
    fn conversion_us(self) -> u32 {
        match self {
            Self::Ads1015 => 2_000,
            Self::Ads1115 => 10_000,
        }
    }

    fn decode(self, bytes: [u8; 2]) -> i32 {
        let word = i16::from_be_bytes(bytes);
        match self {
            Self::Ads1015 => i32::from(word >> 4),
            Self::Ads1115 => i32::from(word),
        }
    }
}

/// Config register value that starts one conversion on `channel`.
pub fn config_word(channel: u8) -> core::result::Result<u16, ConfigError> {
    if channel > 3 {
        return Err(ConfigError::InvalidChannel(channel));
    }
    let mux = (MUX_SINGLE_BASE + u16::from(channel)) << MUX_SHIFT;
    Ok(OS_START | BASE_CONFIG | mux)
}

pub struct Ads1x15<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    model: AdcModel,
}

impl<I2C: I2c, D: DelayNs> Ads1x15<I2C, D> {
    pub fn new(i2c: I2C, delay: D, address: u8, model: AdcModel) -> Self {
        Self {
            i2c,
            delay,
            address,
            model,
        }
    }

    pub fn model(&self) -> AdcModel {
        self.model
    }

    /// One single-shot conversion.  ADS1015 returns 0..=2047 for positive
    /// single-ended inputs, ADS1115 0..=32767.
    pub fn read_raw(&mut self, channel: u8) -> Result<i32> {
        let config = config_word(channel)?;
        let [hi, lo] = config.to_be_bytes();
        self.i2c
            .write(self.address, &[REG_CONFIG, hi, lo])
            .map_err(|e| SensorError::Bus(e.kind()))?;

        self.delay.delay_us(self.model.conversion_us());

        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_CONVERSION], &mut buf)
            .map_err(|e| SensorError::Bus(e.kind()))?;
        Ok(self.model.decode(buf))
    }

    /// Read the config register; used as a presence probe.
    pub fn probe(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[REG_CONFIG], &mut buf)
            .map_err(|e| SensorError::Bus(e.kind()))?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}
