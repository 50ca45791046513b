//! Balltrack controller library.
//!
//! Exposes the control core, the application service and the adapters for
//! integration testing and for the `balltrack` binary.  Real hardware is
//! reached through `embedded-hal` I2C; the Linux bus is behind the `rpi`
//! feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
