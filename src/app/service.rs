//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the selected [`Controller`] variant and the autotune
//! session, and is the single caller of both, so a tick and a relay step
//! never interleave.  All I/O flows through the controller's ports; events
//! leave through the [`EventSink`] injected at each call.
//!
//! ```text
//!  AppCommand ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                 │        AppService         │
//!   tick(dt)  ──▶ │ Controller · Autotune     │
//!                 └──────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::control::autotune::{AutotuneResult, AutotuneSession};
use crate::control::pid::CompensatorForm;
use crate::control::{ControlLoopStatus, Controller, Gains, clamp_dt};
use crate::error::{ConfigError, Error, Result};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::EventSink;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    ctrl: Box<dyn Controller>,
    /// Upper clamp for a measured tick interval.
    max_dt: f32,
    /// Ticks between telemetry events (0 = never).
    telemetry_every: u32,
    tick_count: u64,
    tune: Option<AutotuneSession>,
    /// Seconds since the running session began.
    tune_clock: f32,
    last_tune: Option<AutotuneResult>,
}

impl AppService {
    /// Wrap an already-built controller.  Regulation is not started.
    pub fn new(ctrl: Box<dyn Controller>, config: &SystemConfig) -> Self {
        Self {
            ctrl,
            max_dt: config.max_dt_secs,
            telemetry_every: config.telemetry_interval_ticks,
            tick_count: 0,
            tune: None,
            tune_clock: 0.0,
            last_tune: None,
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle with the measured interval `dt` (clamped here).
    ///
    /// While an autotune session runs, the controller is in manual mode and
    /// only samples the sensor; the session drives the relay. Otherwise the
    /// controller regulates. Failures are emitted as events and returned; a
    /// failure during tuning also aborts the session. The next call simply
    /// tries again.
    pub fn tick(&mut self, dt: f32, sink: &mut impl EventSink) -> Result<()> {
        self.tick_count += 1;
        let dt = clamp_dt(dt, self.max_dt);

        if let Err(e) = self.ctrl.tick(dt) {
            error!("tick failed: {e}");
            sink.emit(&AppEvent::TickFailed(e));
            if let Some(mut session) = self.tune.take() {
                session.abort(self.ctrl.as_mut());
                sink.emit(&AppEvent::AutotuneAborted(e));
            }
            return Err(e);
        }

        if let Some(session) = self.tune.as_mut() {
            self.tune_clock += dt;
            match session.step(self.ctrl.as_mut(), self.tune_clock) {
                Ok(None) => {}
                Ok(Some(result)) => {
                    self.tune = None;
                    self.finish_tune(result, sink);
                }
                Err(e) => {
                    self.tune = None;
                    error!("autotune aborted: {e}");
                    sink.emit(&AppEvent::AutotuneAborted(e));
                    return Err(e);
                }
            }
        }

        if self.telemetry_every > 0 && self.tick_count % u64::from(self.telemetry_every) == 0 {
            sink.emit(&AppEvent::Telemetry(self.ctrl.status()));
        }
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    ///
    /// Rejected with [`Error::Busy`] when it would interleave with a running
    /// autotune session; only `Stop` and `CancelAutotune` get through.
    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) -> Result<()> {
        if self.is_tuning() && !cmd.allowed_during_autotune() {
            warn!("{cmd:?} rejected: autotune in progress");
            return Err(Error::Busy);
        }

        match cmd {
            AppCommand::Start => {
                self.ctrl.start();
                sink.emit(&AppEvent::Started {
                    setpoint: self.ctrl.setpoint(),
                });
            }
            AppCommand::Stop => {
                self.cancel_tune(sink);
                let result = self.ctrl.stop();
                sink.emit(&AppEvent::Stopped);
                result?;
            }
            AppCommand::SetSetpoint(v) => {
                self.ctrl.set_setpoint(v);
                sink.emit(&AppEvent::SetpointChanged(self.ctrl.setpoint()));
            }
            AppCommand::SetGains(gains) => {
                self.ctrl.set_gains(gains)?;
                self.emit_gains(sink);
            }
            AppCommand::SetForm(form) => {
                self.ctrl.set_form(form)?;
                self.emit_gains(sink);
            }
            AppCommand::DisableIntegral(flag) => {
                self.ctrl.disable_integral(flag)?;
                self.emit_gains(sink);
            }
            AppCommand::DisableDerivative(flag) => {
                self.ctrl.disable_derivative(flag)?;
                self.emit_gains(sink);
            }
            AppCommand::ConfigureAdvanced(cfg) => {
                self.ctrl.set_advanced(cfg)?;
                sink.emit(&AppEvent::AdvancedChanged(cfg));
            }
            AppCommand::EnableManual(flag) => {
                self.ctrl.enable_manual(flag);
                sink.emit(&AppEvent::ModeChanged { manual: flag });
            }
            AppCommand::SetManualPosition(p) => {
                self.ctrl.set_manual_position(p)?;
            }
            AppCommand::StartAutotune(cfg) => {
                let mut session = AutotuneSession::new(cfg)?;
                sink.emit(&AppEvent::AutotuneStarted(cfg.method));
                match session.begin(self.ctrl.as_mut()) {
                    Ok(None) => {
                        self.tune_clock = 0.0;
                        self.tune = Some(session);
                    }
                    Ok(Some(result)) => self.finish_tune(result, sink),
                    Err(e) => {
                        sink.emit(&AppEvent::AutotuneAborted(e));
                        return Err(e);
                    }
                }
            }
            AppCommand::CancelAutotune => self.cancel_tune(sink),
            AppCommand::ApplyTunedGains => {
                let tuned = self
                    .last_tune
                    .as_ref()
                    .and_then(AutotuneResult::gains)
                    .ok_or(ConfigError::ValidationFailed("no successful autotune result"))?;
                self.ctrl.set_form(CompensatorForm::Parallel)?;
                self.ctrl.set_gains(Gains::new(tuned.kp, tuned.ki, tuned.kd))?;
                self.emit_gains(sink);
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> ControlLoopStatus {
        self.ctrl.status()
    }

    pub fn controller(&self) -> &dyn Controller {
        self.ctrl.as_ref()
    }

    pub fn is_tuning(&self) -> bool {
        self.tune.as_ref().is_some_and(AutotuneSession::is_running)
    }

    /// The last finished autotune outcome, if any.
    pub fn last_autotune(&self) -> Option<&AutotuneResult> {
        self.last_tune.as_ref()
    }

    /// Hand the last outcome (and its samples) to the caller.
    pub fn take_autotune_result(&mut self) -> Option<AutotuneResult> {
        self.last_tune.take()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn cancel_tune(&mut self, sink: &mut impl EventSink) {
        if let Some(mut session) = self.tune.take() {
            if let Some(result) = session.cancel(self.ctrl.as_mut()) {
                self.finish_tune(result, sink);
            }
        }
    }

    fn finish_tune(&mut self, result: AutotuneResult, sink: &mut impl EventSink) {
        info!("autotune {result}");
        sink.emit(&AppEvent::AutotuneFinished(result.outcome()));
        self.last_tune = Some(result);
    }

    fn emit_gains(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::GainsApplied {
            form: self.ctrl.form(),
            gains: self.ctrl.gains(),
        });
    }
}
