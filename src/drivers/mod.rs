//! I2C peripheral drivers for the position ADC and the servo PWM chip.

pub mod ads1x15;
pub mod pca9685;
