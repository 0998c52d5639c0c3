//! Mock thermostat adapter for integration tests.
//!
//! Records every device call so tests can assert on the full command
//! history, and lets tests script the reported status and failures.

use pid_thermostat::app::events::AppEvent;
use pid_thermostat::app::ports::{
    DeviceError, DeviceMode, DeviceStatus, EventSink, SensorSelector, ThermostatPort,
};

// ── Device call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    ReadStatus,
    SetPower(bool),
    SetMode { mode: DeviceMode, schedule: u8, sensor: SensorSelector },
    SetTarget(f32),
}

// ── MockThermostat ────────────────────────────────────────────

pub struct MockThermostat {
    pub status: DeviceStatus,
    pub calls: Vec<DeviceCall>,
    /// Reads left that will time out.
    pub failing_reads: u32,
    /// Writes left that will time out.
    pub failing_writes: u32,
}

#[allow(dead_code)]
impl MockThermostat {
    /// Powered, idle, manual mode, 20 °C everywhere.
    pub fn new() -> Self {
        Self {
            status: DeviceStatus {
                room_temp: 20.0,
                external_temp: 20.0,
                target_temp: 20.0,
                power: true,
                active: false,
                auto_mode: false,
                min_temp: 7.0,
                max_temp: 35.0,
            },
            calls: Vec::new(),
            failing_reads: 0,
            failing_writes: 0,
        }
    }

    /// Set both sensors to `celsius`.
    pub fn set_temp(&mut self, celsius: f32) {
        self.status.room_temp = celsius;
        self.status.external_temp = celsius;
    }

    pub fn writes(&self) -> Vec<DeviceCall> {
        self.calls
            .iter()
            .filter(|c| **c != DeviceCall::ReadStatus)
            .cloned()
            .collect()
    }

    pub fn last_target(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            DeviceCall::SetTarget(t) => Some(*t),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    fn write(&mut self, call: DeviceCall) -> Result<(), DeviceError> {
        self.calls.push(call);
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(DeviceError::Timeout);
        }
        Ok(())
    }
}

impl Default for MockThermostat {
    fn default() -> Self {
        Self::new()
    }
}

impl ThermostatPort for MockThermostat {
    fn read_status(&mut self) -> Result<DeviceStatus, DeviceError> {
        self.calls.push(DeviceCall::ReadStatus);
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(DeviceError::Timeout);
        }
        Ok(self.status)
    }

    fn set_power(&mut self, on: bool) -> Result<(), DeviceError> {
        self.write(DeviceCall::SetPower(on))?;
        self.status.power = on;
        Ok(())
    }

    fn set_mode(
        &mut self,
        mode: DeviceMode,
        schedule: u8,
        sensor: SensorSelector,
    ) -> Result<(), DeviceError> {
        self.write(DeviceCall::SetMode { mode, schedule, sensor })?;
        self.status.auto_mode = mode == DeviceMode::Auto;
        Ok(())
    }

    fn set_target_temperature(&mut self, celsius: f32) -> Result<(), DeviceError> {
        self.write(DeviceCall::SetTarget(celsius))?;
        self.status.target_temp = celsius;
        // The relay follows the target on the next status read.
        self.status.active = celsius > self.status.room_temp;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Event sink that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Service helpers ───────────────────────────────────────────

use embassy_time::Instant;
use pid_thermostat::adapters::memory_store::MemoryStore;
use pid_thermostat::app::restore::RestoredState;
use pid_thermostat::app::service::{HvacMode, Preset, ThermostatService};
use pid_thermostat::config::{PidActivation, ThermostatConfig};

pub fn at(secs: u64) -> Instant {
    Instant::from_secs(secs)
}

/// Service that always drives the device, with its PID target restored
/// to `target`. `tweak` edits the config before construction.
#[allow(dead_code)]
pub fn managed_service(target: f32, tweak: impl FnOnce(&mut ThermostatConfig)) -> ThermostatService {
    let mut config = ThermostatConfig {
        pid_activation: PidActivation::Always,
        ..ThermostatConfig::default()
    };
    tweak(&mut config);
    let mut svc = ThermostatService::new(config).unwrap();

    let mut store = MemoryStore::new();
    let state = RestoredState {
        preset: Preset::None,
        last_on_mode: HvacMode::Auto,
        pid_target_temp: target,
        gains: svc.gains(),
    };
    state.save(&mut store, svc.config().name.as_str()).unwrap();
    assert!(svc.restore(&store).unwrap());
    svc
}
