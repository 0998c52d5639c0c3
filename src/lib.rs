//! PID thermostat control library.
//!
//! Drives a thermostat that only accepts "set target temperature" through
//! a PID regulator, a relay-feedback autotuner and a slow-PWM duty cycle.
//! The control core lives in [`control`] and [`app`]; everything touching
//! the outside world sits behind the port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod scheduler;

pub use error::{Error, Result};
