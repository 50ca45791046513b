//! Simulated ball-on-beam rig.
//!
//! Stands in for the ADC + PWM pair when the hardware probe fails (`DUMMY`)
//! or when simulation is requested (`SIM`).  Deterministic: no noise, no
//! wall clock, time only moves through [`SensorPort::advance`].
//!
//! Plant, with `θ` the beam tilt in normalized units:
//!
//! ```text
//! θ' = (θ_cmd − θ) / τ          servo lag
//! v' = g·θ − c·v                rolling ball with damping
//! x' = v                        end stops at 0 and 1
//! ```
//!
//! `θ_cmd` follows the last pulse (`(pulse − mid) / span`) and drops to 0
//! while the channel is disabled.

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::SystemConfig;
use crate::control::servo::PulseRange;
use crate::error::{ConfigError, Result};

/// Integration sub-step.
const MAX_STEP: f32 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantParams {
    /// Servo time constant, seconds.
    pub tau: f32,
    /// Acceleration per unit tilt.
    pub gain: f32,
    /// Viscous damping.
    pub damping: f32,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            tau: 0.08,
            gain: 0.8,
            damping: 0.5,
        }
    }
}

pub struct SimulatedRig {
    params: PlantParams,
    pulses: PulseRange,
    resolution: f32,
    adc_channel: u8,
    pwm_channel: u8,

    position: f32,
    velocity: f32,
    tilt: f32,
    /// Last commanded pulse, `None` while de-energised.
    pulse_us: Option<u16>,
}

impl SimulatedRig {
    /// Ball at rest in the middle, servo de-energised.
    pub fn new(config: &SystemConfig) -> Result<Self> {
        Self::with_params(config, PlantParams::default())
    }

    pub fn with_params(config: &SystemConfig, params: PlantParams) -> Result<Self> {
        let pulses = config.pwm.pulse_range()?;
        if config.adc.resolution == 0 {
            return Err(ConfigError::InvalidResolution.into());
        }
        Ok(Self {
            params,
            pulses,
            resolution: config.adc.resolution as f32,
            adc_channel: config.adc.channel,
            pwm_channel: config.pwm.channel,
            position: 0.5,
            velocity: 0.0,
            tilt: 0.0,
            pulse_us: None,
        })
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    /// Place the ball (clamped to the track) at rest.
    pub fn set_position(&mut self, position: f32) {
        self.position = position.clamp(0.0, 1.0);
        self.velocity = 0.0;
    }

    pub fn pulse_us(&self) -> Option<u16> {
        self.pulse_us
    }

    fn commanded_tilt(&self) -> f32 {
        match self.pulse_us {
            Some(p) => self.pulses.to_output(p).clamp(-1.0, 1.0),
            None => 0.0,
        }
    }

    fn integrate(&mut self, h: f32) {
        let p = self.params;
        let target = self.commanded_tilt();
        if p.tau > 0.0 {
            self.tilt += (target - self.tilt) * (h / p.tau).min(1.0);
        } else {
            self.tilt = target;
        }
        self.velocity += (p.gain * self.tilt - p.damping * self.velocity) * h;
        self.position += self.velocity * h;

        if self.position <= 0.0 {
            self.position = 0.0;
            self.velocity = self.velocity.max(0.0);
        } else if self.position >= 1.0 {
            self.position = 1.0;
            self.velocity = self.velocity.min(0.0);
        }
    }
}

impl SensorPort for SimulatedRig {
    fn read_raw(&mut self, channel: u8) -> Result<i32> {
        if channel != self.adc_channel {
            return Err(ConfigError::InvalidChannel(channel).into());
        }
        Ok((self.position * self.resolution).round() as i32)
    }

    fn advance(&mut self, dt: f32) {
        if dt.is_nan() || dt <= 0.0 {
            return;
        }
        let steps = (dt / MAX_STEP).ceil().max(1.0) as u32;
        let h = dt / steps as f32;
        for _ in 0..steps {
            self.integrate(h);
        }
    }
}

impl ActuatorPort for SimulatedRig {
    fn set_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        if channel != self.pwm_channel {
            return Err(ConfigError::InvalidChannel(channel).into());
        }
        self.pulse_us = Some(pulse_us);
        Ok(())
    }

    fn disable(&mut self, channel: u8) -> Result<()> {
        if channel != self.pwm_channel {
            return Err(ConfigError::InvalidChannel(channel).into());
        }
        self.pulse_us = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> SimulatedRig {
        SimulatedRig::new(&SystemConfig::default()).unwrap()
    }

    #[test]
    fn level_beam_keeps_ball_still() {
        let mut r = rig();
        r.set_pulse(0, 1500).unwrap();
        for _ in 0..100 {
            r.advance(0.02);
        }
        assert_eq!(r.position(), 0.5);
        assert_eq!(r.read_raw(0).unwrap(), 1024);
    }

    #[test]
    fn tilt_rolls_ball_toward_high_pulse_end() {
        let mut r = rig();
        r.set_pulse(0, 1700).unwrap();
        for _ in 0..25 {
            r.advance(0.02);
        }
        assert!(r.position() > 0.5);
    }

    #[test]
    fn end_stops_hold() {
        let mut r = rig();
        r.set_pulse(0, 1000).unwrap();
        for _ in 0..1000 {
            r.advance(0.02);
        }
        assert_eq!(r.position(), 0.0);
        assert_eq!(r.read_raw(0).unwrap(), 0);
    }

    #[test]
    fn disabled_servo_levels_out() {
        let mut r = rig();
        r.set_pulse(0, 2000).unwrap();
        r.disable(0).unwrap();
        assert_eq!(r.pulse_us(), None);
        r.advance(0.5);
        assert_eq!(r.position(), 0.5);
    }

    #[test]
    fn wrong_channel_is_config_error() {
        let mut r = rig();
        assert!(r.read_raw(2).is_err());
        assert!(r.set_pulse(5, 1500).is_err());
    }
}
