//! Mock rig for integration tests.
//!
//! Records every port call so tests can assert on the full command history
//! without touching a real I2C bus.  State sits behind a shared handle so a
//! test can keep one clone for inspection and fault injection while the
//! controller owns the other.

use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;

use balltrack::app::events::AppEvent;
use balltrack::app::ports::{ActuatorPort, EventSink, SensorPort};
use balltrack::config::SystemConfig;
use balltrack::control::BackendMode;
use balltrack::control::position::PositionLoop;
use balltrack::error::{ActuatorError, Result, SensorError};
use embedded_hal::i2c::ErrorKind;

// ── Port call record ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortCall {
    Read { channel: u8 },
    SetPulse { channel: u8, pulse_us: u16 },
    Disable { channel: u8 },
}

/// What the mock ADC returns, in normalized position units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Constant(f32),
    /// `center + amplitude · sin(2π·t/period + phase)` on the mock clock.
    Sine {
        center: f32,
        amplitude: f32,
        period: f32,
        phase: f32,
    },
    /// `level` until `hold` seconds, then the sine above starting from its
    /// own zero time.
    HeldSine {
        level: f32,
        hold: f32,
        center: f32,
        amplitude: f32,
        period: f32,
        phase: f32,
    },
}

struct RigState {
    signal: Signal,
    resolution: f32,
    clock: f32,
    calls: Vec<PortCall>,
    sensor_fault: bool,
    actuator_fault: bool,
}

// ── MockRig ───────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockRig {
    state: Rc<RefCell<RigState>>,
}

#[allow(dead_code)]
impl MockRig {
    pub fn new(signal: Signal, resolution: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                signal,
                resolution: resolution as f32,
                clock: 0.0,
                calls: Vec::new(),
                sensor_fault: false,
                actuator_fault: false,
            })),
        }
    }

    pub fn set_signal(&self, signal: Signal) {
        self.state.borrow_mut().signal = signal;
    }

    pub fn fail_sensor(&self, fail: bool) {
        self.state.borrow_mut().sensor_fault = fail;
    }

    pub fn fail_actuator(&self, fail: bool) {
        self.state.borrow_mut().actuator_fault = fail;
    }

    pub fn clock(&self) -> f32 {
        self.state.borrow().clock
    }

    pub fn calls(&self) -> Vec<PortCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn pulses(&self) -> Vec<u16> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                PortCall::SetPulse { pulse_us, .. } => Some(*pulse_us),
                _ => None,
            })
            .collect()
    }

    pub fn last_pulse(&self) -> Option<u16> {
        self.pulses().last().copied()
    }

    pub fn servo_off(&self) -> bool {
        matches!(
            self.state.borrow().calls.last(),
            Some(PortCall::Disable { .. })
        )
    }
}

impl SensorPort for MockRig {
    fn read_raw(&mut self, channel: u8) -> Result<i32> {
        let mut s = self.state.borrow_mut();
        s.calls.push(PortCall::Read { channel });
        if s.sensor_fault {
            return Err(SensorError::Bus(ErrorKind::NoAcknowledge(
                embedded_hal::i2c::NoAcknowledgeSource::Address,
            ))
            .into());
        }
        let y = match s.signal {
            Signal::Constant(y) => y,
            Signal::Sine {
                center,
                amplitude,
                period,
                phase,
            } => center + amplitude * (2.0 * PI * s.clock / period + phase).sin(),
            Signal::HeldSine { level, hold, .. } if s.clock < hold => level,
            Signal::HeldSine {
                hold,
                center,
                amplitude,
                period,
                phase,
                ..
            } => center + amplitude * (2.0 * PI * (s.clock - hold) / period + phase).sin(),
        };
        Ok((y * s.resolution).round() as i32)
    }

    fn advance(&mut self, dt: f32) {
        self.state.borrow_mut().clock += dt;
    }
}

impl ActuatorPort for MockRig {
    fn set_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if s.actuator_fault {
            return Err(ActuatorError::Bus(ErrorKind::Bus).into());
        }
        s.calls.push(PortCall::SetPulse { channel, pulse_us });
        Ok(())
    }

    fn disable(&mut self, channel: u8) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if s.actuator_fault {
            return Err(ActuatorError::Bus(ErrorKind::Bus).into());
        }
        s.calls.push(PortCall::Disable { channel });
        Ok(())
    }
}

/// A stopped loop on the mock rig, plus the inspection handle.
#[allow(dead_code)]
pub fn mock_loop(config: &SystemConfig, signal: Signal) -> (PositionLoop<MockRig>, MockRig) {
    let rig = MockRig::new(signal, config.adc.resolution);
    let handle = rig.clone();
    let ctrl = PositionLoop::new(rig, config, BackendMode::Hardware).unwrap();
    (ctrl, handle)
}

// ── LogSink ───────────────────────────────────────────────────

/// Event sink that keeps everything for assertions.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(*event);
    }
}
