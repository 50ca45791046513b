//! Command dispatch and orchestration through `AppService`.

use balltrack::adapters::build_controller;
use balltrack::adapters::sim::SimulatedRig;
use balltrack::app::commands::AppCommand;
use balltrack::app::events::AppEvent;
use balltrack::app::service::AppService;
use balltrack::config::SystemConfig;
use balltrack::control::advanced::AdvancedConfig;
use balltrack::control::autotune::AutotuneConfig;
use balltrack::control::pid::CompensatorForm;
use balltrack::control::{BackendMode, Gains};
use balltrack::error::{ConfigError, Error, Result, SensorError};

use crate::mock_hw::{LogSink, MockRig, Signal, mock_loop};

fn make_app(signal: Signal) -> (AppService, MockRig, LogSink) {
    let mut config = SystemConfig::default();
    config.adc.resolution = 10_000;
    config.telemetry_interval_ticks = 10;
    let (ctrl, rig) = mock_loop(&config, signal);
    (AppService::new(Box::new(ctrl), &config), rig, LogSink::new())
}

#[test]
fn start_then_tick_commands_servo() {
    let (mut app, rig, mut sink) = make_app(Signal::Constant(0.3));
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    app.tick(0.02, &mut sink).unwrap();

    assert_eq!(rig.last_pulse(), Some(1700));
    assert_eq!(sink.events.first(), Some(&AppEvent::Started { setpoint: 0.5 }));
}

#[test]
fn stop_disables_servo_and_emits_event() {
    let (mut app, rig, mut sink) = make_app(Signal::Constant(0.3));
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    app.tick(0.02, &mut sink).unwrap();
    app.handle_command(AppCommand::Stop, &mut sink).unwrap();

    assert!(rig.servo_off());
    assert!(!app.status().running);
    assert_eq!(sink.events.last(), Some(&AppEvent::Stopped));
}

#[test]
fn commands_rejected_while_tuning() {
    let (mut app, _rig, mut sink) = make_app(Signal::Constant(0.5));
    app.handle_command(AppCommand::StartAutotune(AutotuneConfig::default()), &mut sink)
        .unwrap();
    assert!(app.is_tuning());

    for cmd in [
        AppCommand::Start,
        AppCommand::SetGains(Gains::new(1.0, 0.0, 0.0)),
        AppCommand::SetForm(CompensatorForm::Ideal),
        AppCommand::EnableManual(false),
        AppCommand::SetManualPosition(0.2),
        AppCommand::StartAutotune(AutotuneConfig::default()),
    ] {
        assert_eq!(app.handle_command(cmd, &mut sink), Err(Error::Busy), "{cmd:?}");
    }

    // Stop gets through and ends the session
    app.handle_command(AppCommand::Stop, &mut sink).unwrap();
    assert!(!app.is_tuning());
    assert!(!app.controller().is_manual());
}

#[test]
fn invalid_gains_rejected_and_previous_kept() {
    let (mut app, _rig, mut sink) = make_app(Signal::Constant(0.5));
    app.handle_command(AppCommand::SetForm(CompensatorForm::Ideal), &mut sink)
        .unwrap();
    let err = app
        .handle_command(AppCommand::SetGains(Gains::new(1.0, -2.0, 0.0)), &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::NegativeTimeConstant(_))));
    assert_eq!(app.controller().gains(), Gains::new(2.0, 0.0, 0.0));
}

#[test]
fn advanced_config_validated() {
    let (mut app, _rig, mut sink) = make_app(Signal::Constant(0.5));
    let bad = AdvancedConfig {
        derivative_filter: true,
        n: 0.0,
        ..AdvancedConfig::default()
    };
    assert!(app.handle_command(AppCommand::ConfigureAdvanced(bad), &mut sink).is_err());

    let good = AdvancedConfig {
        anti_windup: true,
        ..AdvancedConfig::default()
    };
    app.handle_command(AppCommand::ConfigureAdvanced(good), &mut sink).unwrap();
    assert_eq!(app.controller().advanced(), good);
    assert_eq!(sink.events.last(), Some(&AppEvent::AdvancedChanged(good)));
}

#[test]
fn tick_failure_reported_and_recovers() {
    let (mut app, rig, mut sink) = make_app(Signal::Constant(0.3));
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    rig.fail_actuator(true);
    assert!(app.tick(0.02, &mut sink).is_err());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::TickFailed(_))), 1);

    rig.fail_actuator(false);
    app.tick(0.02, &mut sink).unwrap();
    assert_eq!(rig.last_pulse(), Some(1700));
}

#[test]
fn telemetry_carries_status() {
    let (mut app, _rig, mut sink) = make_app(Signal::Constant(0.3));
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    for _ in 0..20 {
        app.tick(0.02, &mut sink).unwrap();
    }
    let telem: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(telem.len(), 2);
    assert_eq!(telem[1].mode, BackendMode::Hardware);
    assert!(telem[1].running);
}

#[test]
fn degraded_backend_still_regulates() {
    let config = SystemConfig::default();
    let ctrl = build_controller(&config, |_: &SystemConfig| -> Result<SimulatedRig> {
        Err(SensorError::Offline.into())
    })
    .unwrap();
    let mut app = AppService::new(ctrl, &config);
    let mut sink = LogSink::new();
    assert_eq!(app.status().mode, BackendMode::Dummy);

    app.handle_command(AppCommand::SetSetpoint(0.7), &mut sink).unwrap();
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    for _ in 0..10 {
        app.tick(0.02, &mut sink).unwrap();
    }
    let s = app.status();
    assert_eq!(s.mode, BackendMode::Dummy);
    assert!(s.output > 0.0);
    assert!(s.pulse_us > 1500);
}
