//! Thermostat configuration parameters
//!
//! All tunable parameters for one PID-managed thermostat. Values are
//! loaded from JSON by the host runner and validated once, before the
//! control core is constructed.

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::control::{PidGains, TuningRule};
use crate::error::{Error, Result};

/// When the PID loop is allowed to drive the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PidActivation {
    /// Whenever the device is powered on.
    Always,
    /// Only while the `Eco` preset is selected; otherwise the device's
    /// own thermostat logic is in charge.
    EcoPreset,
}

/// Per-device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermostatConfig {
    /// Device name, used as log prefix and persistence key.
    pub name: heapless::String<32>,

    // --- Device ---
    /// Device-side schedule slot sent with every mode change.
    pub schedule: u8,
    /// Regulate on the external probe instead of the built-in room sensor.
    pub use_external_temp: bool,
    /// Control loop tick interval (seconds).
    pub check_interval_secs: u32,

    // --- PID ---
    /// Relay step / output magnitude.
    pub difference: f32,
    pub out_min: f32,
    pub out_max: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Minimum time between effective PID updates (seconds).
    pub sample_interval_secs: u32,
    /// PWM period for the duty-cycle scheduler (seconds).
    pub pwm_secs: u32,
    pub pid_activation: PidActivation,

    // --- Autotune ---
    /// Tuning rule; `None` disables autotuning at start-up.
    pub autotune: Option<TuningRule>,
    /// Relay hysteresis band (°C).
    pub noiseband: f32,
    /// Peak confirmation window (seconds); `None` follows
    /// `check_interval_secs`.
    pub autotune_lookback_secs: Option<u32>,
    /// Abort an autotune session that has not converged after this long.
    pub autotune_max_duration_secs: u32,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        let mut name = heapless::String::new();
        let _ = name.push_str("thermostat");
        Self {
            name,

            // Device
            schedule: 1,
            use_external_temp: true,
            check_interval_secs: 300, // 5 min

            // PID
            difference: 100.0,
            out_min: 0.0,
            out_max: 100.0,
            kp: 100.0,
            ki: 40.0,
            kd: 60.0,
            sample_interval_secs: 300,
            pwm_secs: 300,
            pid_activation: PidActivation::EcoPreset,

            // Autotune
            autotune: None,
            noiseband: 0.5,
            autotune_lookback_secs: None,
            autotune_max_duration_secs: 48 * 3600,
        }
    }
}

impl ThermostatConfig {
    /// Reject out-of-range values. Nothing downstream re-checks these.
    pub fn validate(&self) -> Result<()> {
        let floats = [
            self.difference,
            self.out_min,
            self.out_max,
            self.kp,
            self.ki,
            self.kd,
            self.noiseband,
        ];
        if floats.iter().any(|v| !v.is_finite()) {
            return Err(Error::Config("numeric fields must be finite"));
        }
        if self.out_min > 0.0 {
            return Err(Error::Config("out_min must be <= 0"));
        }
        if self.out_max < 0.0 {
            return Err(Error::Config("out_max must be >= 0"));
        }
        if self.out_min == self.out_max {
            return Err(Error::Config("out_min and out_max must differ"));
        }
        if self.kp < 0.0 || self.ki < 0.0 || self.kd < 0.0 {
            return Err(Error::Config("kp, ki and kd must be >= 0"));
        }
        if self.difference <= 0.0 {
            return Err(Error::Config("difference must be > 0"));
        }
        if self.noiseband <= 0.0 {
            return Err(Error::Config("noiseband must be > 0"));
        }
        if self.check_interval_secs == 0 {
            return Err(Error::Config("check_interval_secs must be > 0"));
        }
        if self.sample_interval_secs == 0 {
            return Err(Error::Config("sample_interval_secs must be > 0"));
        }
        if self.pwm_secs == 0 {
            return Err(Error::Config("pwm_secs must be > 0"));
        }
        if self.autotune_lookback_secs == Some(0) {
            return Err(Error::Config("autotune_lookback_secs must be > 0"));
        }
        if self.autotune_max_duration_secs == 0 {
            return Err(Error::Config("autotune_max_duration_secs must be > 0"));
        }
        Ok(())
    }

    pub fn gains(&self) -> PidGains {
        PidGains::new(self.kp, self.ki, self.kd)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.check_interval_secs))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.sample_interval_secs))
    }

    pub fn pwm_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.pwm_secs))
    }

    pub fn autotune_lookback(&self) -> Duration {
        let secs = self.autotune_lookback_secs.unwrap_or(self.check_interval_secs);
        Duration::from_secs(u64::from(secs))
    }

    pub fn autotune_max_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.autotune_max_duration_secs))
    }
}
