//! Application core: command dispatch and orchestration, zero I/O.
//!
//! [`service::AppService`] drives the selected controller and the autotune
//! session.  All interaction with hardware happens through the **port
//! traits** defined in [`ports`], keeping this layer testable on the host
//! with the simulated rig or a mock.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
