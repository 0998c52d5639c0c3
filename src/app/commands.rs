//! Inbound commands to the thermostat service.
//!
//! These represent actions requested by the outside world (UI, automation,
//! the simulation console) that the
//! [`ThermostatService`](super::service::ThermostatService) interprets and
//! acts upon.

use serde::{Deserialize, Serialize};

use crate::control::TuningRule;

use super::service::{HvacMode, Preset};

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AppCommand {
    /// Change the desired temperature (°C).
    SetTargetTemperature(f32),

    /// Switch between the device's own logic and PID management.
    SetPreset(Preset),

    /// Power off, or power on in manual (`Heat`) / scheduled (`Auto`) mode.
    SetHvacMode(HvacMode),

    /// Power on in the last used mode.
    TurnOn,

    /// Same as `SetHvacMode(HvacMode::Off)`.
    TurnOff,

    /// Begin a relay-feedback autotune at the current PID target.
    StartAutotune(TuningRule),

    /// Abandon a running autotune session.
    CancelAutotune,
}
