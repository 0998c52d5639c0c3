//! Thermostat service: the hexagonal core.
//!
//! [`ThermostatService`] owns the regulator, the optional autotune session
//! and the duty-cycle state for exactly one device. All I/O flows through
//! port traits injected at call sites, making the whole control loop
//! testable with mock adapters and synthetic time.
//!
//! ```text
//!                 ┌───────────────────────────┐ ──▶ EventSink
//!  on_tick(now) ─▶│    ThermostatService       │
//! ThermostatPort ◀│ PID · Autotune · DutyCycle │ ◀─▶ StoragePort
//!                 └───────────────────────────┘
//! ```

use embassy_time::Instant;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{PidActivation, ThermostatConfig};
use crate::control::{
    Action, AutotuneSettings, AutotuneState, Autotuner, DutyCycle, PidGains, PidRegulator,
    TuningRule,
};
use crate::error::{DeviceError, Error, Result};

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{DeviceMode, DeviceStatus, EventSink, SensorSelector, StoragePort, ThermostatPort};
use super::restore::RestoredState;

/// PID target before the user ever picked one.
pub const DEFAULT_PID_TARGET_TEMP: f32 = 10.0;

// ───────────────────────────────────────────────────────────────
// Presentation types
// ───────────────────────────────────────────────────────────────

/// User-selected preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// The device regulates itself.
    #[default]
    None,
    /// The PID loop drives the device.
    Eco,
}

/// Operating mode as presented to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    /// Powered, manual device mode.
    Heat,
    /// Powered, device follows its schedule.
    #[default]
    Auto,
}

impl HvacMode {
    pub fn from_status(status: &DeviceStatus) -> Self {
        if !status.power {
            Self::Off
        } else if status.auto_mode {
            Self::Auto
        } else {
            Self::Heat
        }
    }
}

/// What the heater is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacAction {
    Off,
    Heating,
    Idle,
}

impl HvacAction {
    pub fn from_status(status: &DeviceStatus) -> Self {
        match (status.power, status.active) {
            (false, _) => Self::Off,
            (true, true) => Self::Heating,
            (true, false) => Self::Idle,
        }
    }
}

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Status read failed; no control state was touched.
    Skipped(DeviceError),
    /// Device is off or under its own control this tick.
    Unmanaged,
    /// An action was decided and applied (`Hold` included).
    Decided { output: f32, action: Action },
    /// The decision could not be applied; it is retried next tick.
    ActuationFailed { action: Action, error: DeviceError },
}

#[derive(Debug, Clone)]
struct AutotuneSession {
    rule: TuningRule,
    tuner: Autotuner,
}

// ───────────────────────────────────────────────────────────────
// ThermostatService
// ───────────────────────────────────────────────────────────────

/// Control loop driver for one thermostat.
pub struct ThermostatService {
    config: ThermostatConfig,
    gains: PidGains,
    pid: PidRegulator,
    autotune: Option<AutotuneSession>,
    duty: DutyCycle,

    preset: Preset,
    last_on_mode: HvacMode,
    pid_target_temp: f32,

    /// Last successfully read device status.
    status: Option<DeviceStatus>,
    output: f32,
    last_action: Option<Action>,
    tick_count: u64,
    state_dirty: bool,
}

impl ThermostatService {
    /// Construct the service from a configuration, rejecting invalid ones.
    ///
    /// Does **not** start autotuning; call [`restore`](Self::restore)
    /// (optional) and then [`start`](Self::start).
    pub fn new(config: ThermostatConfig) -> Result<Self> {
        config.validate()?;
        let gains = config.gains();
        let pid = regulator(&config, gains);
        let duty = DutyCycle::new(config.pwm_period());
        Ok(Self {
            config,
            gains,
            pid,
            autotune: None,
            duty,
            preset: Preset::None,
            last_on_mode: HvacMode::Auto,
            pid_target_temp: DEFAULT_PID_TARGET_TEMP,
            status: None,
            output: 0.0,
            last_action: None,
            tick_count: 0,
            state_dirty: false,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the service and begin the configured autotune, if any.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started(self.gains));
        info!(
            "{}: started, kp={} ki={} kd={}",
            self.config.name, self.gains.kp, self.gains.ki, self.gains.kd
        );
        if self.autotune.is_none() {
            if let Some(rule) = self.config.autotune {
                self.begin_autotune(rule, sink);
            }
        }
    }

    /// Load persisted preset, modes, PID target and gains.
    ///
    /// Returns `Ok(false)` when nothing was stored. The regulator is always
    /// rebuilt with a zeroed accumulator.
    pub fn restore(&mut self, storage: &impl StoragePort) -> Result<bool> {
        let Some(state) = RestoredState::load(storage, &self.config.name)? else {
            return Ok(false);
        };
        if !state.is_sane() {
            warn!("{}: ignoring unusable restored state {:?}", self.config.name, state);
            return Ok(false);
        }
        self.preset = state.preset;
        self.last_on_mode = match state.last_on_mode {
            HvacMode::Off => HvacMode::Auto,
            mode => mode,
        };
        self.pid_target_temp = state.pid_target_temp;
        self.gains = state.gains;
        self.pid = regulator(&self.config, self.gains);
        self.duty.reset();
        info!(
            "{}: restored preset={:?} target={} kp={} ki={} kd={}",
            self.config.name,
            self.preset,
            self.pid_target_temp,
            self.gains.kp,
            self.gains.ki,
            self.gains.kd
        );
        Ok(true)
    }

    /// Persist the restorable subset of the state.
    pub fn persist(&mut self, storage: &mut impl StoragePort) -> Result<()> {
        self.snapshot().save(storage, &self.config.name)?;
        self.state_dirty = false;
        Ok(())
    }

    /// Persist only if something restorable changed. Returns `true` if saved.
    pub fn persist_if_dirty(&mut self, storage: &mut impl StoragePort) -> bool {
        if !self.state_dirty {
            return false;
        }
        match self.persist(storage) {
            Ok(()) => {
                info!("{}: state saved", self.config.name);
                true
            }
            Err(e) => {
                warn!("{}: state save failed: {}", self.config.name, e);
                false
            }
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: read status → autotune / PID → duty cycle →
    /// actuate.
    ///
    /// A failed status read returns [`TickOutcome::Skipped`] before any
    /// control state is touched.
    pub fn on_tick(
        &mut self,
        now: Instant,
        device: &mut impl ThermostatPort,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.tick_count += 1;

        // 1. Read the device
        let status = match device.read_status() {
            Ok(status) => status,
            Err(e) => {
                warn!("{}: status read failed ({}), skipping tick", self.config.name, e);
                sink.emit(&AppEvent::TickFailed(e));
                return TickOutcome::Skipped(e);
            }
        };
        self.status = Some(status);

        // 2. Is the PID in charge?
        if !status.power || !self.pid_managed() {
            self.last_action = None;
            sink.emit(&AppEvent::Telemetry(self.telemetry()));
            return TickOutcome::Unmanaged;
        }

        // 3. Control output from the autotuner or the regulator
        let measured = status.measured(self.sensor());
        let output = self.control_output(measured, now, sink);
        self.output = output;

        // 4. Duty-cycle decision
        let action = self
            .duty
            .decide(output, self.config.out_min, self.config.out_max, now, status.active);
        self.last_action = Some(action);

        // 5. Apply via ThermostatPort
        let outcome = match self.apply(action, &status, device) {
            Ok(wrote) => {
                let forced =
                    DutyCycle::is_forced(output, self.config.out_min, self.config.out_max);
                let switched = if forced {
                    self.duty.record_forced(action, now)
                } else {
                    self.duty.record(action, now)
                };
                if switched && wrote {
                    let on = action == Action::TurnOn;
                    let target = if on { status.max_temp } else { status.min_temp };
                    info!(
                        "{}: heater {} (output={:.1}, target={})",
                        self.config.name,
                        if on { "ON" } else { "OFF" },
                        output,
                        target
                    );
                    sink.emit(&AppEvent::ActuatorSwitched { on, target });
                }
                TickOutcome::Decided { output, action }
            }
            Err(error) => {
                warn!("{}: {:?} failed: {}", self.config.name, action, error);
                sink.emit(&AppEvent::ActuationFailed { action, error });
                TickOutcome::ActuationFailed { action, error }
            }
        };

        sink.emit(&AppEvent::Telemetry(self.telemetry()));
        outcome
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command. Device failures are returned, never
    /// retried here.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now: Instant,
        device: &mut impl ThermostatPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::SetTargetTemperature(celsius) => {
                if !celsius.is_finite() {
                    return Err(Error::Config("target temperature must be finite"));
                }
                if self.pid_managed() {
                    self.pid_target_temp = celsius;
                    self.state_dirty = true;
                    info!("{}: PID target set to {}", self.config.name, celsius);
                    // Out-of-band tick so the new target takes effect now.
                    let outcome = self.on_tick(now, device, sink);
                    info!("{}: target change tick: {:?}", self.config.name, outcome);
                } else {
                    device.set_mode(DeviceMode::Manual, self.config.schedule, self.sensor())?;
                    device.set_target_temperature(celsius)?;
                }
            }
            AppCommand::SetPreset(preset) => {
                if preset != self.preset {
                    info!("{}: preset {:?} -> {:?}", self.config.name, self.preset, preset);
                    self.preset = preset;
                    self.duty.reset();
                    self.state_dirty = true;
                }
            }
            AppCommand::SetHvacMode(mode) => self.set_hvac_mode(mode, device)?,
            AppCommand::TurnOn => self.set_hvac_mode(self.last_on_mode, device)?,
            AppCommand::TurnOff => self.set_hvac_mode(HvacMode::Off, device)?,
            AppCommand::StartAutotune(rule) => self.begin_autotune(rule, sink),
            AppCommand::CancelAutotune => {
                if self.autotune.take().is_some() {
                    info!("{}: autotune cancelled", self.config.name);
                    self.pid.reset();
                    self.duty.reset();
                }
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn telemetry(&self) -> TelemetryData {
        let status = self.status.as_ref();
        TelemetryData {
            measured_temp: status.map(|s| s.measured(self.sensor())),
            device_target_temp: status.map(|s| s.target_temp),
            pid_target_temp: self.pid_target_temp,
            gains: self.gains,
            control_output: self.output,
            action: self.last_action,
            hvac_mode: self.hvac_mode(),
            hvac_action: self.hvac_action(),
            preset: self.preset,
            autotuning: self.autotune.is_some(),
        }
    }

    /// Target shown to the user: the PID target while the PID manages the
    /// device, else the device's own target.
    pub fn target_temperature(&self) -> Option<f32> {
        if self.pid_managed() {
            Some(self.pid_target_temp)
        } else {
            self.status.map(|s| s.target_temp)
        }
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.status.as_ref().map_or(HvacMode::Off, HvacMode::from_status)
    }

    pub fn hvac_action(&self) -> HvacAction {
        self.status.as_ref().map_or(HvacAction::Off, HvacAction::from_status)
    }

    /// Whether the activation policy hands the device to the PID loop.
    pub fn pid_managed(&self) -> bool {
        match self.config.pid_activation {
            PidActivation::Always => true,
            PidActivation::EcoPreset => self.preset == Preset::Eco,
        }
    }

    pub fn regulator(&self) -> &PidRegulator {
        &self.pid
    }

    pub fn duty_cycle(&self) -> &DutyCycle {
        &self.duty
    }

    /// Running autotune session, if any.
    pub fn autotuner(&self) -> Option<&Autotuner> {
        self.autotune.as_ref().map(|s| &s.tuner)
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn last_on_mode(&self) -> HvacMode {
        self.last_on_mode
    }

    pub fn pid_target_temp(&self) -> f32 {
        self.pid_target_temp
    }

    /// Last control output fed to the duty cycle.
    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn last_action(&self) -> Option<Action> {
        self.last_action
    }

    pub fn status(&self) -> Option<&DeviceStatus> {
        self.status.as_ref()
    }

    /// Total ticks attempted since construction.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    /// Whether restorable state changed since the last persist.
    pub fn is_state_dirty(&self) -> bool {
        self.state_dirty
    }

    /// Restorable subset of the state.
    pub fn snapshot(&self) -> RestoredState {
        RestoredState {
            preset: self.preset,
            last_on_mode: self.last_on_mode,
            pid_target_temp: self.pid_target_temp,
            gains: self.gains,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn sensor(&self) -> SensorSelector {
        if self.config.use_external_temp {
            SensorSelector::External
        } else {
            SensorSelector::Internal
        }
    }

    fn begin_autotune(&mut self, rule: TuningRule, sink: &mut impl EventSink) {
        let settings = AutotuneSettings {
            setpoint: self.pid_target_temp,
            out_step: self.config.difference,
            out_min: self.config.out_min,
            out_max: self.config.out_max,
            noiseband: self.config.noiseband,
            lookback: self.config.autotune_lookback(),
            max_duration: self.config.autotune_max_duration(),
        };
        self.autotune = Some(AutotuneSession {
            rule,
            tuner: Autotuner::new(settings),
        });
        self.duty.reset();
        info!(
            "{}: autotune ({}) started at {}",
            self.config.name, rule, self.pid_target_temp
        );
        sink.emit(&AppEvent::AutotuneStarted {
            rule,
            setpoint: self.pid_target_temp,
        });
    }

    /// Relay output while tuning, regulator output otherwise. Hands
    /// control back to a regulator when the session ends either way.
    fn control_output(&mut self, measured: f32, now: Instant, sink: &mut impl EventSink) -> f32 {
        let Some(session) = self.autotune.as_mut() else {
            return self.pid.compute(measured, self.pid_target_temp, now);
        };

        if session.tuner.run(measured, now) {
            let rule = session.rule;
            if let Some(gains) = session.tuner.tuned_gains(rule) {
                info!(
                    "{}: autotune ({}) gains kp={} ki={} kd={}",
                    self.config.name, rule, gains.kp, gains.ki, gains.kd
                );
                self.gains = gains;
                self.state_dirty = true;
                sink.emit(&AppEvent::AutotuneConverged { rule, gains });
            }
            self.autotune = None;
            self.pid = regulator(&self.config, self.gains);
            self.duty.reset();
            return self.pid.compute(measured, self.pid_target_temp, now);
        }

        if let AutotuneState::Failed(e) = session.tuner.state() {
            warn!("{}: autotune failed: {}", self.config.name, e);
            sink.emit(&AppEvent::AutotuneFailed(e));
            self.autotune = None;
            self.pid.reset();
            self.duty.reset();
            return self.pid.compute(measured, self.pid_target_temp, now);
        }

        session.tuner.output()
    }

    /// Realize a duty-cycle action through target-temperature writes.
    /// Returns `true` if anything was written to the device.
    fn apply(
        &self,
        action: Action,
        status: &DeviceStatus,
        device: &mut impl ThermostatPort,
    ) -> core::result::Result<bool, DeviceError> {
        let target = match action {
            Action::Hold => return Ok(false),
            // Already heating at the top of the range.
            Action::TurnOn if status.target_temp >= status.max_temp && status.active => {
                return Ok(false);
            }
            // Already idling at the bottom of the range.
            Action::TurnOff if status.target_temp <= status.min_temp && !status.active => {
                return Ok(false);
            }
            Action::TurnOn => status.max_temp,
            Action::TurnOff => status.min_temp,
        };
        self.push_target(target, device)?;
        Ok(true)
    }

    fn push_target(
        &self,
        celsius: f32,
        device: &mut impl ThermostatPort,
    ) -> core::result::Result<(), DeviceError> {
        device.set_power(true)?;
        device.set_mode(DeviceMode::Manual, self.config.schedule, self.sensor())?;
        device.set_target_temperature(celsius)
    }

    fn set_hvac_mode(
        &mut self,
        mode: HvacMode,
        device: &mut impl ThermostatPort,
    ) -> core::result::Result<(), DeviceError> {
        match mode {
            HvacMode::Off => device.set_power(false),
            HvacMode::Heat | HvacMode::Auto => {
                if self.last_on_mode != mode {
                    self.last_on_mode = mode;
                    self.state_dirty = true;
                }
                device.set_power(true)?;
                if self.pid_managed() {
                    return Ok(());
                }
                let device_mode = if mode == HvacMode::Auto {
                    DeviceMode::Auto
                } else {
                    DeviceMode::Manual
                };
                device.set_mode(device_mode, self.config.schedule, self.sensor())
            }
        }
    }
}

fn regulator(config: &ThermostatConfig, gains: PidGains) -> PidRegulator {
    PidRegulator::new(gains, config.sample_interval(), config.out_min, config.out_max)
}
