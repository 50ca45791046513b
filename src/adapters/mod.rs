//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements          | Connects to                  |
//! |------------|---------------------|------------------------------|
//! | `hardware` | SensorPort          | ADS1015/ADS1115 over I2C     |
//! |            | ActuatorPort        | PCA9685 over I2C             |
//! | `sim`      | SensorPort          | Simulated ball-on-beam rig   |
//! |            | ActuatorPort        |                              |
//! | `log_sink` | EventSink           | `log` facade + event ring    |
//! | `time`     |                     | Monotonic clock tick pacing  |

pub mod hardware;
pub mod log_sink;
pub mod sim;
pub mod time;

use log::{info, warn};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::SystemConfig;
use crate::control::position::PositionLoop;
use crate::control::{BackendMode, Controller};
use crate::error::Result;

use sim::SimulatedRig;

/// Select the controller variant once at startup.
///
/// With `simulate` set the simulated rig is used outright (`SIM`).
/// Otherwise `probe` brings up the real hardware; a hardware failure there
/// degrades to the simulated rig tagged `DUMMY`, while configuration errors
/// are returned unchanged.
pub fn build_controller<B, F>(config: &SystemConfig, probe: F) -> Result<Box<dyn Controller>>
where
    B: SensorPort + ActuatorPort + 'static,
    F: FnOnce(&SystemConfig) -> Result<B>,
{
    config.validate()?;

    if config.simulate {
        info!("backend: SIM (requested)");
        let rig = SimulatedRig::new(config)?;
        return Ok(Box::new(PositionLoop::new(rig, config, BackendMode::Simulated)?));
    }

    match probe(config) {
        Ok(hw) => {
            info!("backend: HW");
            Ok(Box::new(PositionLoop::new(hw, config, BackendMode::Hardware)?))
        }
        Err(e) if e.is_hardware() => {
            warn!("hardware probe failed ({e}); running DUMMY on the simulated rig");
            let rig = SimulatedRig::new(config)?;
            Ok(Box::new(PositionLoop::new(rig, config, BackendMode::Dummy)?))
        }
        Err(e) => Err(e),
    }
}
