//! Balltrack: Main Entry Point
//!
//! Hexagonal architecture around a fixed-rate control tick.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  Adapters (outer ring)                   │
//! │                                                          │
//! │  HardwareAdapter / SimulatedRig   LogEventSink  TickTimer│
//! │  (Sensor + Actuator)              (EventSink)   (pacing) │
//! │                                                          │
//! │  ──────────────── Port Trait Boundary ────────────────   │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │             AppService (pure logic)                │  │
//! │  │  PositionLoop · PID · Autotune                     │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use balltrack::adapters::build_controller;
use balltrack::adapters::log_sink::LogEventSink;
use balltrack::adapters::time::TickTimer;
use balltrack::app::commands::AppCommand;
use balltrack::app::service::AppService;
use balltrack::config::SystemConfig;

/// Environment variable naming the JSON config file.
const CONFIG_ENV: &str = "BALLTRACK_CONFIG";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Balltrack v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Configuration ──────────────────────────────────────
    let config = load_config();
    config.validate().context("invalid configuration")?;

    // ── 2. Backend selection ──────────────────────────────────
    let ctrl = build_controller(&config, probe::open).context("controller construction failed")?;
    info!("backend mode: {}", ctrl.status().mode);

    // ── 3. Application service ────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut app = AppService::new(ctrl, &config);
    app.handle_command(AppCommand::SetSetpoint(config.default_setpoint), &mut sink)?;
    app.handle_command(AppCommand::Start, &mut sink)?;

    info!("System ready. Entering control loop.");

    // ── 4. Control loop ───────────────────────────────────────
    let period = Duration::from_millis(u64::from(config.tick_period_ms));
    let mut timer = TickTimer::new(period, config.max_dt_secs);
    loop {
        let tick = timer.wait();
        if tick.skipped > 0 {
            warn!("control loop overran, {} tick(s) skipped", tick.skipped);
        }
        // Failures are already reported through the sink; keep ticking.
        let _ = app.tick(tick.dt, &mut sink);
    }
}

/// Read the JSON config named by `BALLTRACK_CONFIG`, falling back to
/// defaults when unset, unreadable or malformed.
fn load_config() -> SystemConfig {
    let Ok(path) = std::env::var(CONFIG_ENV) else {
        info!("{CONFIG_ENV} not set, using defaults");
        return SystemConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(cfg) => {
                info!("Config loaded from {path}");
                cfg
            }
            Err(e) => {
                warn!("Config {path} is malformed ({e}), using defaults");
                SystemConfig::default()
            }
        },
        Err(e) => {
            warn!("Config {path} unreadable ({e}), using defaults");
            SystemConfig::default()
        }
    }
}

#[cfg(feature = "rpi")]
mod probe {
    use linux_embedded_hal::{Delay, I2cdev};

    use balltrack::adapters::hardware::HardwareAdapter;
    use balltrack::config::SystemConfig;
    use balltrack::error::{ActuatorError, Result, SensorError};

    /// Open `/dev/i2c-N` for each chip and bring the rig up.
    pub fn open(config: &SystemConfig) -> Result<HardwareAdapter<I2cdev, Delay>> {
        let adc = I2cdev::new(format!("/dev/i2c-{}", config.adc.i2c_bus)).map_err(|e| {
            log::warn!("ADC bus /dev/i2c-{}: {e}", config.adc.i2c_bus);
            SensorError::Offline
        })?;
        let pwm = I2cdev::new(format!("/dev/i2c-{}", config.pwm.i2c_bus)).map_err(|e| {
            log::warn!("PWM bus /dev/i2c-{}: {e}", config.pwm.i2c_bus);
            ActuatorError::Offline
        })?;
        HardwareAdapter::probe((adc, Delay), (pwm, Delay), config)
    }
}

#[cfg(not(feature = "rpi"))]
mod probe {
    use balltrack::adapters::sim::SimulatedRig;
    use balltrack::config::SystemConfig;
    use balltrack::error::{Result, SensorError};

    /// No I2C support compiled in; the rig is always absent.
    pub fn open(_config: &SystemConfig) -> Result<SimulatedRig> {
        log::warn!("built without the `rpi` feature, no I2C buses available");
        Err(SensorError::Offline.into())
    }
}
