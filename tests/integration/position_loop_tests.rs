//! Position loop driven directly against the mock rig.

use balltrack::config::SystemConfig;
use balltrack::control::Controller;
use balltrack::control::pid::{CompensatorConfig, CompensatorForm, PidController};
use balltrack::error::{Error, SensorError};

use crate::mock_hw::{PortCall, Signal, mock_loop};

fn p_only() -> SystemConfig {
    let mut config = SystemConfig::default();
    config.adc.resolution = 10_000;
    config
}

#[test]
fn first_tick_proportional_output() {
    let config = p_only();
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.3));
    ctrl.set_setpoint(0.5);
    ctrl.start();
    ctrl.tick(0.02).unwrap();

    let s = ctrl.status();
    assert!((s.measurement - 0.3).abs() < 1e-4);
    assert!((s.output - 0.4).abs() < 1e-4);
    assert_eq!(s.pulse_us, 1700);
    assert!(!s.saturated);
    assert_eq!(rig.calls(), vec![
        PortCall::Read { channel: 0 },
        PortCall::SetPulse {
            channel: 0,
            pulse_us: 1700
        },
    ]);
}

#[test]
fn stopped_loop_touches_nothing() {
    let config = p_only();
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.3));
    for _ in 0..5 {
        ctrl.tick(0.02).unwrap();
    }
    assert!(rig.calls().is_empty());
    assert!((rig.clock() - 0.1).abs() < 1e-5);
}

#[test]
fn manual_position_maps_to_exact_pulse() {
    let config = p_only();
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.5));
    ctrl.start();
    ctrl.enable_manual(true);
    assert!(!ctrl.is_running());

    ctrl.set_manual_position(0.75).unwrap();
    assert_eq!(rig.last_pulse(), Some(1750));
    assert!((ctrl.servo_position() - 0.75).abs() < 1e-6);

    // manual ticks sample the sensor but never command
    rig.clear_calls();
    rig.set_signal(Signal::Constant(0.62));
    ctrl.tick(0.02).unwrap();
    assert_eq!(rig.calls(), vec![PortCall::Read { channel: 0 }]);
    assert!((ctrl.status().measurement - 0.62).abs() < 1e-4);
    assert_eq!(ctrl.status().raw, 6200);

    ctrl.enable_manual(false);
    assert!(ctrl.is_running());
}

#[test]
fn manual_position_ignored_in_auto() {
    let config = p_only();
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.5));
    ctrl.set_manual_position(0.9).unwrap();
    assert_eq!(rig.last_pulse(), None);
}

#[test]
fn restart_clears_integral() {
    let mut config = p_only();
    config.pid.parallel.integral = 1.5;
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.4));
    ctrl.start();
    for _ in 0..20 {
        ctrl.tick(0.02).unwrap();
    }
    assert!(ctrl.status().i > 0.0);

    ctrl.stop().unwrap();
    assert!(rig.servo_off());
    assert_eq!(ctrl.status().i, 0.0);
    ctrl.start();
    ctrl.tick(0.02).unwrap();

    let mut fresh = PidController::new(CompensatorConfig::from_gains(
        CompensatorForm::Parallel,
        config.pid.parallel,
        config.pid.umin,
        config.pid.umax,
    ));
    fresh.update(ctrl.status().setpoint - ctrl.status().measurement, 0.02);
    assert!((ctrl.status().i - fresh.last_i()).abs() < 1e-6);
}

#[test]
fn sensor_fault_keeps_last_status() {
    let config = p_only();
    let (mut ctrl, rig) = mock_loop(&config, Signal::Constant(0.3));
    ctrl.start();
    ctrl.tick(0.02).unwrap();
    let before = ctrl.status();

    rig.fail_sensor(true);
    let err = ctrl.tick(0.02).unwrap_err();
    assert!(matches!(err, Error::Sensor(SensorError::Bus(_))));
    assert_eq!(ctrl.status(), before);
    assert!(ctrl.is_running());

    rig.fail_sensor(false);
    ctrl.tick(0.02).unwrap();
}

#[test]
fn disabling_integral_keeps_user_gains() {
    let mut config = p_only();
    config.pid.parallel.integral = 3.0;
    let (mut ctrl, _rig) = mock_loop(&config, Signal::Constant(0.4));
    ctrl.disable_integral(true).unwrap();
    ctrl.start();
    for _ in 0..10 {
        ctrl.tick(0.02).unwrap();
    }
    assert_eq!(ctrl.status().i, 0.0);
    assert_eq!(ctrl.gains().integral, 3.0);

    ctrl.disable_integral(false).unwrap();
    ctrl.tick(0.02).unwrap();
    assert!(ctrl.status().i > 0.0);
}

#[test]
fn form_switch_loads_stored_gains() {
    let mut config = p_only();
    config.pid.series = balltrack::control::Gains::new(1.0, 0.0, 0.0);
    let (mut ctrl, _rig) = mock_loop(&config, Signal::Constant(0.3));
    ctrl.set_form(CompensatorForm::Series).unwrap();
    assert_eq!(ctrl.form(), CompensatorForm::Series);
    ctrl.start();
    ctrl.tick(0.02).unwrap();
    assert!((ctrl.status().output - 0.2).abs() < 1e-4);
}
