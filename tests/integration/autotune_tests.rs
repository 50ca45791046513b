//! Relay autotune sessions stepped through the service against a scripted
//! oscillation on the mock rig.

use std::f32::consts::PI;

use balltrack::app::commands::AppCommand;
use balltrack::app::events::AppEvent;
use balltrack::app::service::AppService;
use balltrack::config::SystemConfig;
use balltrack::control::autotune::{
    AutotuneConfig, AutotuneFailure, AutotuneMethod, AutotuneResult,
};
use balltrack::control::pid::CompensatorForm;
use balltrack::error::Error;

use crate::mock_hw::{LogSink, MockRig, Signal, mock_loop};

const DT: f32 = 0.02;

fn rig_config() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.adc.resolution = 10_000;
    config.telemetry_interval_ticks = 0;
    config
}

fn oscillating() -> Signal {
    Signal::Sine {
        center: 0.5,
        amplitude: 0.1,
        period: 1.0,
        phase: 0.3,
    }
}

fn service(signal: Signal) -> (AppService, MockRig, LogSink) {
    let config = rig_config();
    let (ctrl, rig) = mock_loop(&config, signal);
    let app = AppService::new(Box::new(ctrl), &config);
    (app, rig, LogSink::new())
}

fn relay(max_duration: f32) -> AppCommand {
    AppCommand::StartAutotune(AutotuneConfig {
        method: AutotuneMethod::ZnRelay,
        amplitude: 0.1,
        sample_time: DT,
        max_duration,
    })
}

fn run_until_idle(app: &mut AppService, sink: &mut LogSink, max_ticks: usize) {
    for _ in 0..max_ticks {
        if !app.is_tuning() {
            return;
        }
        app.tick(DT, sink).unwrap();
    }
}

#[test]
fn relay_identifies_ultimate_gain_and_period() {
    let (mut app, rig, mut sink) = service(oscillating());
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    app.handle_command(relay(10.0), &mut sink).unwrap();
    assert!(app.is_tuning());
    assert!(app.controller().is_manual());

    run_until_idle(&mut app, &mut sink, 1000);
    assert!(!app.is_tuning());

    let gains = app.last_autotune().and_then(AutotuneResult::gains).unwrap();
    assert!((gains.pu - 1.0).abs() < 0.02, "Pu = {}", gains.pu);
    let ku = 4.0 * 0.1 / (PI * 0.2);
    assert!((gains.ku - ku).abs() / ku < 0.05, "Ku = {}", gains.ku);
    assert!((gains.kp - 0.6 * gains.ku).abs() < 1e-5);

    // relay only ever commands 0.5 ± A
    assert!(rig.pulses().iter().all(|p| [1400, 1500, 1600].contains(p)));

    // automatic mode restored, regulation resumes
    assert!(!app.controller().is_manual());
    assert!(app.controller().is_running());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::AutotuneFinished(Ok(_)))),
        1
    );
}

#[test]
fn start_up_transient_does_not_bias_ultimate_gain() {
    // ball parked far below the setpoint before the relay oscillation settles
    let (mut app, _rig, mut sink) = service(Signal::HeldSine {
        level: 0.1,
        hold: 0.5,
        center: 0.5,
        amplitude: 0.05,
        period: 1.0,
        phase: 0.3,
    });
    app.handle_command(relay(10.0), &mut sink).unwrap();
    run_until_idle(&mut app, &mut sink, 1000);

    let gains = app.last_autotune().and_then(AutotuneResult::gains).unwrap();
    let ku = 4.0 * 0.1 / (PI * 0.1);
    assert!((gains.ku - ku).abs() / ku < 0.05, "Ku = {}", gains.ku);
    assert!((gains.pu - 1.0).abs() < 0.02, "Pu = {}", gains.pu);
}

#[test]
fn tuned_gains_can_be_applied() {
    let (mut app, _rig, mut sink) = service(oscillating());
    app.handle_command(relay(10.0), &mut sink).unwrap();
    run_until_idle(&mut app, &mut sink, 1000);
    let tuned = app.last_autotune().and_then(AutotuneResult::gains).unwrap();

    app.handle_command(AppCommand::ApplyTunedGains, &mut sink).unwrap();
    assert_eq!(app.controller().form(), CompensatorForm::Parallel);
    let g = app.controller().gains();
    assert_eq!((g.gain, g.integral, g.derivative), (tuned.kp, tuned.ki, tuned.kd));
}

#[test]
fn flat_plant_times_out_without_oscillation() {
    let (mut app, _rig, mut sink) = service(Signal::Constant(0.3));
    app.handle_command(relay(1.0), &mut sink).unwrap();
    run_until_idle(&mut app, &mut sink, 200);

    let result = app.take_autotune_result().unwrap();
    assert_eq!(result.failure(), Some(AutotuneFailure::NoOscillation));
    assert!(!result.samples().is_empty());
    assert!(!app.controller().is_manual());
}

#[test]
fn cancel_restores_automatic_mode() {
    let (mut app, _rig, mut sink) = service(oscillating());
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    app.handle_command(relay(10.0), &mut sink).unwrap();
    for _ in 0..10 {
        app.tick(DT, &mut sink).unwrap();
    }
    app.handle_command(AppCommand::CancelAutotune, &mut sink).unwrap();

    assert!(!app.is_tuning());
    assert!(!app.controller().is_manual());
    assert!(app.controller().is_running());
    assert_eq!(
        app.last_autotune().and_then(AutotuneResult::failure),
        Some(AutotuneFailure::Cancelled)
    );
}

#[test]
fn sensor_fault_aborts_session() {
    let (mut app, rig, mut sink) = service(oscillating());
    app.handle_command(AppCommand::Start, &mut sink).unwrap();
    app.handle_command(relay(10.0), &mut sink).unwrap();
    app.tick(DT, &mut sink).unwrap();

    rig.fail_sensor(true);
    let err = app.tick(DT, &mut sink).unwrap_err();
    assert!(matches!(err, Error::Sensor(_)));
    assert!(!app.is_tuning());
    assert!(!app.controller().is_manual());
    assert!(app.controller().is_running());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::AutotuneAborted(_))), 1);
}

#[test]
fn unimplemented_methods_fail_without_touching_the_rig() {
    for method in [AutotuneMethod::ZnStep, AutotuneMethod::CohenCoon] {
        let (mut app, rig, mut sink) = service(oscillating());
        let cmd = AppCommand::StartAutotune(AutotuneConfig {
            method,
            ..AutotuneConfig::default()
        });
        app.handle_command(cmd, &mut sink).unwrap();
        assert!(!app.is_tuning());
        assert!(rig.calls().is_empty());
        assert_eq!(
            app.last_autotune().and_then(AutotuneResult::failure),
            Some(AutotuneFailure::NotImplemented(method))
        );
    }
}
