//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ThermostatService (domain)
//! ```
//!
//! Driven adapters (the thermostat device, clock, event sinks, storage)
//! implement these traits. The [`ThermostatService`](super::service::ThermostatService)
//! consumes them via generics, so the control core never talks to a
//! network or a clock directly.
//!
//! ## Contract notes
//!
//! - **ThermostatPort** implementations MUST enforce a bounded timeout on
//!   every call and report it as [`DeviceError::Timeout`].
//! - All port errors are typed; callers handle every variant explicitly.

use embassy_time::Instant;
use serde::{Deserialize, Serialize};

pub use crate::error::{DeviceError, StorageError};

// ───────────────────────────────────────────────────────────────
// Thermostat port (driven adapter: domain ↔ device)
// ───────────────────────────────────────────────────────────────

/// Device-side operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceMode {
    /// Holds whatever target temperature it was last given.
    Manual,
    /// Follows the device's internal schedule.
    Auto,
}

/// Which probe the device regulates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorSelector {
    /// Built-in room sensor.
    Internal,
    /// External floor / water probe.
    External,
}

/// Snapshot returned by [`ThermostatPort::read_status`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceStatus {
    /// Built-in room sensor (°C).
    pub room_temp: f32,
    /// External probe (°C).
    pub external_temp: f32,
    /// Current device target temperature (°C).
    pub target_temp: f32,
    /// Device is powered on.
    pub power: bool,
    /// Heating relay currently closed.
    pub active: bool,
    /// Device follows its own schedule.
    pub auto_mode: bool,
    /// Lowest accepted target (°C); used as the OFF setpoint.
    pub min_temp: f32,
    /// Highest accepted target (°C); used as the ON setpoint.
    pub max_temp: f32,
}

impl DeviceStatus {
    /// The measured value for the configured sensor.
    pub fn measured(&self, sensor: SensorSelector) -> f32 {
        match sensor {
            SensorSelector::Internal => self.room_temp,
            SensorSelector::External => self.external_temp,
        }
    }
}

/// Actuation adapter for a thermostat that only exposes "set target
/// temperature" style controls.
///
/// Every call may fail; none of the failures are fatal to the control
/// loop.
pub trait ThermostatPort {
    /// Read temperatures, target, power/relay state and target limits.
    fn read_status(&mut self) -> Result<DeviceStatus, DeviceError>;

    /// Power the device on or off.
    fn set_power(&mut self, on: bool) -> Result<(), DeviceError>;

    /// Select operating mode, schedule slot and regulation sensor.
    fn set_mode(
        &mut self,
        mode: DeviceMode,
        schedule: u8,
        sensor: SensorSelector,
    ) -> Result<(), DeviceError>;

    /// Set the device's target temperature (°C).
    fn set_target_temperature(&mut self, celsius: f32) -> Result<(), DeviceError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: time source → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic time source. Tests inject synthetic time through this.
pub trait Clock {
    fn now(&self) -> Instant;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ persistent storage)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for restored thermostat state.
///
/// Keys are namespaced to prevent collisions between subsystems.
/// Write operations MUST be atomic: no partial writes on power loss.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}
