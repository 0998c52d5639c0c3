//! Simulated thermostat device.
//!
//! Implements [`ThermostatPort`] on top of a first-order room model so the
//! control loop can be exercised without hardware. The device runs its own
//! on/off hysteresis against the target temperature, exactly like the real
//! thermostat, so the PID loop can only influence it by moving the target.
//!
//! Failures can be injected to exercise the skip-tick path.

use embassy_time::Duration;
use log::debug;

use crate::app::ports::{DeviceError, DeviceMode, DeviceStatus, SensorSelector, ThermostatPort};
use crate::control::pid::secs;

/// Thermal model parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomModel {
    /// Outdoor / surrounding temperature (°C).
    pub ambient: f32,
    /// Temperature rise per hour with the heater on and no losses.
    pub heat_rate_per_hour: f32,
    /// Fraction of the room/ambient gap lost per hour.
    pub loss_per_hour: f32,
    /// Fraction of the room/probe gap the external probe closes per hour.
    pub probe_lag_per_hour: f32,
    /// Device-internal switching band (°C).
    pub hysteresis: f32,
}

impl Default for RoomModel {
    fn default() -> Self {
        Self {
            ambient: 5.0,
            heat_rate_per_hour: 6.0,
            loss_per_hour: 0.15,
            probe_lag_per_hour: 2.0,
            hysteresis: 0.5,
        }
    }
}

/// A thermostat plus the room it heats.
#[derive(Debug, Clone)]
pub struct SimulatedThermostat {
    model: RoomModel,
    room_temp: f32,
    external_temp: f32,
    target_temp: f32,
    power: bool,
    auto_mode: bool,
    active: bool,
    min_temp: f32,
    max_temp: f32,
    schedule: u8,
    sensor: SensorSelector,
    /// Calls left that will time out.
    failures_pending: u32,
    calls: u64,
}

impl SimulatedThermostat {
    pub fn new(model: RoomModel, initial_temp: f32) -> Self {
        Self {
            model,
            room_temp: initial_temp,
            external_temp: initial_temp,
            target_temp: 20.0,
            power: true,
            auto_mode: true,
            active: false,
            min_temp: 7.0,
            max_temp: 35.0,
            schedule: 1,
            sensor: SensorSelector::Internal,
            failures_pending: 0,
            calls: 0,
        }
    }

    /// Make the next `n` port calls fail with [`DeviceError::Timeout`].
    pub fn inject_timeouts(&mut self, n: u32) {
        self.failures_pending = n;
    }

    /// Advance the physical model by `dt`.
    pub fn advance(&mut self, dt: Duration) {
        let hours = secs(dt) / 3600.0;
        if hours <= 0.0 {
            return;
        }

        let regulated = match self.sensor {
            SensorSelector::Internal => self.room_temp,
            SensorSelector::External => self.external_temp,
        };
        let half_band = self.model.hysteresis / 2.0;
        self.active = self.power
            && if self.active {
                regulated < self.target_temp + half_band
            } else {
                regulated < self.target_temp - half_band
            };

        let heat = if self.active { self.model.heat_rate_per_hour } else { 0.0 };
        let loss = self.model.loss_per_hour * (self.room_temp - self.model.ambient);
        self.room_temp += (heat - loss) * hours;

        let lag = (self.model.probe_lag_per_hour * hours).min(1.0);
        self.external_temp += (self.room_temp - self.external_temp) * lag;
    }

    pub fn room_temp(&self) -> f32 {
        self.room_temp
    }

    pub fn target_temp(&self) -> f32 {
        self.target_temp
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_powered(&self) -> bool {
        self.power
    }

    pub fn schedule(&self) -> u8 {
        self.schedule
    }

    /// Total port calls, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn begin_call(&mut self) -> Result<(), DeviceError> {
        self.calls += 1;
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(DeviceError::Timeout);
        }
        Ok(())
    }
}

impl ThermostatPort for SimulatedThermostat {
    fn read_status(&mut self) -> Result<DeviceStatus, DeviceError> {
        self.begin_call()?;
        Ok(DeviceStatus {
            room_temp: self.room_temp,
            external_temp: self.external_temp,
            target_temp: self.target_temp,
            power: self.power,
            active: self.active,
            auto_mode: self.auto_mode,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
        })
    }

    fn set_power(&mut self, on: bool) -> Result<(), DeviceError> {
        self.begin_call()?;
        self.power = on;
        if !on {
            self.active = false;
        }
        Ok(())
    }

    fn set_mode(
        &mut self,
        mode: DeviceMode,
        schedule: u8,
        sensor: SensorSelector,
    ) -> Result<(), DeviceError> {
        self.begin_call()?;
        self.auto_mode = mode == DeviceMode::Auto;
        self.schedule = schedule;
        self.sensor = sensor;
        Ok(())
    }

    fn set_target_temperature(&mut self, celsius: f32) -> Result<(), DeviceError> {
        self.begin_call()?;
        if !celsius.is_finite() {
            return Err(DeviceError::Rejected);
        }
        self.target_temp = celsius.clamp(self.min_temp, self.max_temp);
        debug!("SimulatedThermostat: target -> {}", self.target_temp);
        Ok(())
    }
}
