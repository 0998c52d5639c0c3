//! Outbound application events.
//!
//! The [`ThermostatService`](super::service::ThermostatService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them.

use crate::control::{Action, AutotuneError, PidGains, TuningRule};
use crate::error::DeviceError;

use super::service::{HvacAction, HvacMode, Preset};

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the effective gains).
    Started(PidGains),

    /// A tick was skipped because the device could not be read.
    TickFailed(DeviceError),

    /// A duty-cycle decision could not be applied; retried next tick.
    ActuationFailed { action: Action, error: DeviceError },

    /// The actuator was switched ON (target pushed to `max_temp`) or OFF.
    ActuatorSwitched { on: bool, target: f32 },

    /// An autotune session began at `setpoint`.
    AutotuneStarted { rule: TuningRule, setpoint: f32 },

    /// Autotune converged and the regulator was rebuilt with `gains`.
    AutotuneConverged { rule: TuningRule, gains: PidGains },

    /// Autotune stalled; the regulator keeps its previous gains.
    AutotuneFailed(AutotuneError),

    /// Periodic snapshot of the loop, once per successful tick.
    Telemetry(TelemetryData),
}

/// Read-only attributes for the surrounding integration to display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryData {
    /// `None` until the first successful status read.
    pub measured_temp: Option<f32>,
    pub device_target_temp: Option<f32>,
    pub pid_target_temp: f32,
    pub gains: PidGains,
    /// Last regulator (or relay) output.
    pub control_output: f32,
    /// Last duty-cycle decision, `None` when the PID is not in charge.
    pub action: Option<Action>,
    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
    pub preset: Preset,
    pub autotuning: bool,
}
