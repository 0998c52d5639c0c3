//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the control loop driver for one thermostat:
//! PID / autotune orchestration, duty-cycle actuation, commands and state
//! restore. All interaction with the device happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without a real thermostat.

pub mod commands;
pub mod events;
pub mod ports;
pub mod restore;
pub mod service;
