//! Position control loop: the controller wrapped around the compensator.
//!
//! [`PositionLoop`] owns one backend that satisfies **both**
//! [`SensorPort`] and [`ActuatorPort`] (the ADC/PWM pair or the simulated
//! rig), so a tick can read and command without a double mutable borrow.
//!
//! ```text
//!  Stopped ──start()──▶ Running ──stop()──▶ Stopped
//!                         │  ▲
//!          enable_manual(true) │  │ enable_manual(false)
//!                         ▼  │
//!                        Manual
//! ```

use log::{debug, info, warn};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::SystemConfig;
use crate::error::Result;

use super::advanced::{AdvancedConfig, AdvancedPid};
use super::pid::{CompensatorConfig, CompensatorForm, PidController};
use super::servo::PulseRange;
use super::{BackendMode, ControlLoopStatus, Controller, Gains};

const FORMS: usize = 3;

fn slot(form: CompensatorForm) -> usize {
    match form {
        CompensatorForm::Parallel => 0,
        CompensatorForm::Ideal => 1,
        CompensatorForm::Series => 2,
    }
}

/// Single-axis ball position controller over a hardware-or-simulated backend.
pub struct PositionLoop<H> {
    hw: H,
    adc_channel: u8,
    pwm_channel: u8,
    resolution: f32,
    pulses: PulseRange,

    pid: AdvancedPid,
    form: CompensatorForm,
    /// User gains per form; the active slot is what `gains()` reports.
    user_gains: [Gains; FORMS],
    umin: f32,
    umax: f32,
    integral_disabled: bool,
    derivative_disabled: bool,

    setpoint: f32,
    running: bool,
    manual: bool,
    /// Regulation state to restore when manual mode ends.
    resume_after_manual: bool,
    last_pulse: u16,

    status: ControlLoopStatus,
}

impl<H: SensorPort + ActuatorPort> PositionLoop<H> {
    /// Build a stopped loop.  The configuration is validated first; nothing
    /// is sent to the backend until `start()` or a manual command.
    pub fn new(hw: H, config: &SystemConfig, mode: BackendMode) -> Result<Self> {
        config.validate()?;
        let pulses = config.pwm.pulse_range()?;
        let pid_cfg = &config.pid;
        let form = pid_cfg.form;
        let core = PidController::new(pid_cfg.compensator(form));
        let pid = AdvancedPid::new(core, pid_cfg.advanced);
        let setpoint = config.default_setpoint;
        let neutral = pulses.neutral();

        Ok(Self {
            hw,
            adc_channel: config.adc.channel,
            pwm_channel: config.pwm.channel,
            resolution: config.adc.resolution as f32,
            pulses,
            pid,
            form,
            user_gains: [pid_cfg.parallel, pid_cfg.ideal, pid_cfg.series],
            umin: pid_cfg.umin,
            umax: pid_cfg.umax,
            integral_disabled: false,
            derivative_disabled: false,
            setpoint,
            running: false,
            manual: false,
            resume_after_manual: false,
            last_pulse: neutral,
            status: ControlLoopStatus {
                raw: 0,
                measurement: 0.0,
                setpoint,
                output: 0.0,
                pulse_us: neutral,
                p: 0.0,
                i: 0.0,
                d: 0.0,
                mode,
                saturated: false,
                running: false,
                manual: false,
            },
        })
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn pulse_range(&self) -> PulseRange {
        self.pulses
    }

    /// Measured value to normalized position.
    fn normalize(&self, raw: i32) -> f32 {
        (raw as f32 / self.resolution).clamp(0.0, 1.0)
    }

    /// Gains with the disable flags applied.
    fn effective_gains(&self) -> Gains {
        let user = self.user_gains[slot(self.form)];
        Gains {
            integral: if self.integral_disabled { 0.0 } else { user.integral },
            derivative: if self.derivative_disabled { 0.0 } else { user.derivative },
            ..user
        }
    }

    /// Rebuild the compensator from the current form, gains and flags.
    /// Validation happens before anything is replaced.
    fn apply_compensator(&mut self) -> Result<()> {
        let cfg =
            CompensatorConfig::from_gains(self.form, self.effective_gains(), self.umin, self.umax);
        self.pid.apply(cfg)?;
        Ok(())
    }

    fn sample(&mut self) -> Result<(i32, f32)> {
        let raw = self.hw.read_raw(self.adc_channel)?;
        let measurement = self.normalize(raw);
        self.status.raw = raw;
        self.status.measurement = measurement;
        Ok((raw, measurement))
    }

    fn sync_flags(&mut self) {
        self.status.setpoint = self.setpoint;
        self.status.running = self.running;
        self.status.manual = self.manual;
    }
}

impl<H: SensorPort + ActuatorPort> Controller for PositionLoop<H> {
    fn start(&mut self) {
        if self.manual {
            info!("leaving manual mode to start regulation");
            self.manual = false;
        }
        self.pid.reset();
        self.running = true;
        self.sync_flags();
        info!("regulation started (setpoint {:.3})", self.setpoint);
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        self.resume_after_manual = false;
        self.pid.reset();
        self.status.output = 0.0;
        self.status.p = 0.0;
        self.status.i = 0.0;
        self.status.d = 0.0;
        self.status.saturated = false;
        self.sync_flags();
        info!("regulation stopped, servo off");
        self.hw.disable(self.pwm_channel)?;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = if setpoint.is_nan() { self.setpoint } else { setpoint.clamp(0.0, 1.0) };
        self.status.setpoint = self.setpoint;
    }

    fn setpoint(&self) -> f32 {
        self.setpoint
    }

    fn set_gains(&mut self, gains: Gains) -> Result<()> {
        let previous = self.user_gains[slot(self.form)];
        self.user_gains[slot(self.form)] = gains;
        if let Err(e) = self.apply_compensator() {
            self.user_gains[slot(self.form)] = previous;
            warn!("gains rejected: {e}");
            return Err(e);
        }
        info!(
            "{} gains set to ({}, {}, {})",
            self.form, gains.gain, gains.integral, gains.derivative
        );
        Ok(())
    }

    fn gains(&self) -> Gains {
        self.user_gains[slot(self.form)]
    }

    fn set_form(&mut self, form: CompensatorForm) -> Result<()> {
        let previous = self.form;
        self.form = form;
        if let Err(e) = self.apply_compensator() {
            self.form = previous;
            return Err(e);
        }
        info!("compensator form set to {form}");
        Ok(())
    }

    fn form(&self) -> CompensatorForm {
        self.form
    }

    fn disable_integral(&mut self, disabled: bool) -> Result<()> {
        self.integral_disabled = disabled;
        self.apply_compensator()
    }

    fn disable_derivative(&mut self, disabled: bool) -> Result<()> {
        self.derivative_disabled = disabled;
        self.apply_compensator()
    }

    fn set_advanced(&mut self, cfg: AdvancedConfig) -> Result<()> {
        self.pid.configure(cfg)?;
        Ok(())
    }

    fn advanced(&self) -> AdvancedConfig {
        *self.pid.config()
    }

    fn enable_manual(&mut self, manual: bool) {
        if manual == self.manual {
            return;
        }
        if manual {
            self.resume_after_manual = self.running;
            self.running = false;
            self.manual = true;
        } else {
            self.manual = false;
            self.running = self.resume_after_manual;
            self.resume_after_manual = false;
            // resume from the current reading, no stale history
            self.pid.reset();
        }
        self.sync_flags();
        info!("manual mode {}", if manual { "on" } else { "off" });
    }

    fn is_manual(&self) -> bool {
        self.manual
    }

    fn set_manual_position(&mut self, position: f32) -> Result<()> {
        if !self.manual {
            debug!("manual position ignored outside manual mode");
            return Ok(());
        }
        let cmd = self.pulses.from_position(position);
        self.hw.set_pulse(self.pwm_channel, cmd.pulse_us)?;
        self.last_pulse = cmd.pulse_us;
        self.status.pulse_us = cmd.pulse_us;
        self.status.saturated = cmd.saturated;
        Ok(())
    }

    fn servo_position(&self) -> f32 {
        self.pulses.to_position(self.last_pulse)
    }

    fn read_position(&mut self) -> Result<f32> {
        let (_, measurement) = self.sample()?;
        Ok(measurement)
    }

    fn tick(&mut self, dt: f32) -> Result<()> {
        self.hw.advance(dt);
        if self.manual {
            // keep the reading live while the servo is positioned by hand
            self.sample()?;
            return Ok(());
        }
        if !self.running {
            return Ok(());
        }

        let raw = self.hw.read_raw(self.adc_channel)?;
        let measurement = self.normalize(raw);
        let error = self.setpoint - measurement;

        let u = self.pid.update(error, self.setpoint, measurement, dt);
        let cmd = self.pulses.from_output(u);
        self.hw.set_pulse(self.pwm_channel, cmd.pulse_us)?;
        self.last_pulse = cmd.pulse_us;

        let (p, i, d) = self.pid.contributions();
        self.status = ControlLoopStatus {
            raw,
            measurement,
            setpoint: self.setpoint,
            output: u,
            pulse_us: cmd.pulse_us,
            p,
            i,
            d,
            mode: self.status.mode,
            saturated: cmd.saturated,
            running: true,
            manual: false,
        };
        debug!(
            "tick raw={raw} y={measurement:.3} e={error:.3} u={u:.3} pulse={}",
            cmd.pulse_us
        );
        Ok(())
    }

    fn status(&self) -> ControlLoopStatus {
        self.status
    }
}
