//! Integration tests for external commands: HVAC modes, presets and
//! target changes in both managed and unmanaged operation.

use crate::mock_hw::{DeviceCall, MockThermostat, RecordingSink, at, managed_service};

use pid_thermostat::Error;
use pid_thermostat::app::commands::AppCommand;
use pid_thermostat::app::ports::{DeviceError, DeviceMode, SensorSelector};
use pid_thermostat::app::service::{HvacMode, Preset, ThermostatService, TickOutcome};
use pid_thermostat::config::ThermostatConfig;
use pid_thermostat::control::Action;

fn unmanaged_service() -> ThermostatService {
    ThermostatService::new(ThermostatConfig::default()).unwrap()
}

fn set_mode(mode: DeviceMode) -> DeviceCall {
    DeviceCall::SetMode { mode, schedule: 1, sensor: SensorSelector::External }
}

fn send(
    svc: &mut ThermostatService,
    cmd: AppCommand,
    dev: &mut MockThermostat,
    sink: &mut RecordingSink,
) -> pid_thermostat::Result<()> {
    svc.handle_command(cmd, at(0), dev, sink)
}

#[test]
fn heat_and_auto_select_device_mode_when_unmanaged() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetHvacMode(HvacMode::Heat), &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true), set_mode(DeviceMode::Manual)]);
    assert_eq!(svc.last_on_mode(), HvacMode::Heat);

    dev.clear();
    send(&mut svc, AppCommand::SetHvacMode(HvacMode::Auto), &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true), set_mode(DeviceMode::Auto)]);
    assert_eq!(svc.last_on_mode(), HvacMode::Auto);
}

#[test]
fn turn_on_restores_last_mode() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetHvacMode(HvacMode::Heat), &mut dev, &mut sink).unwrap();
    dev.clear();

    send(&mut svc, AppCommand::TurnOff, &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(false)]);
    assert_eq!(svc.last_on_mode(), HvacMode::Heat);

    dev.clear();
    send(&mut svc, AppCommand::TurnOn, &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true), set_mode(DeviceMode::Manual)]);
}

#[test]
fn turn_on_defaults_to_auto() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::TurnOn, &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true), set_mode(DeviceMode::Auto)]);
    assert!(!svc.is_state_dirty());
}

#[test]
fn managed_mode_change_only_powers_on() {
    let mut svc = managed_service(21.0, |_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetHvacMode(HvacMode::Heat), &mut dev, &mut sink).unwrap();
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true)]);
    assert_eq!(svc.last_on_mode(), HvacMode::Heat);
    assert!(svc.is_state_dirty());
}

#[test]
fn unmanaged_target_goes_straight_to_device() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetTargetTemperature(21.5), &mut dev, &mut sink).unwrap();

    assert_eq!(
        dev.writes(),
        vec![set_mode(DeviceMode::Manual), DeviceCall::SetTarget(21.5)]
    );
    assert_eq!(svc.pid_target_temp(), 10.0);
    assert!(!svc.is_state_dirty());
}

#[test]
fn managed_target_updates_pid_and_ticks() {
    let mut svc = managed_service(18.0, |_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetTargetTemperature(24.0), &mut dev, &mut sink).unwrap();

    assert_eq!(svc.pid_target_temp(), 24.0);
    assert_eq!(svc.target_temperature(), Some(24.0));
    assert!(svc.is_state_dirty());
    assert_eq!(svc.tick_count(), 1);
    assert_eq!(dev.calls.first(), Some(&DeviceCall::ReadStatus));
    assert_eq!(svc.last_action(), Some(Action::TurnOn));
    assert_eq!(dev.last_target(), Some(35.0));
}

#[test]
fn non_finite_target_is_rejected() {
    let mut svc = managed_service(18.0, |_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let result = send(&mut svc, AppCommand::SetTargetTemperature(bad), &mut dev, &mut sink);
        assert!(matches!(result, Err(Error::Config(_))), "{bad}: {result:?}");
    }
    assert_eq!(svc.pid_target_temp(), 18.0);
    assert!(dev.calls.is_empty());
}

#[test]
fn device_failure_is_returned() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    dev.failing_writes = 1;

    let result = send(&mut svc, AppCommand::SetHvacMode(HvacMode::Heat), &mut dev, &mut sink);

    assert_eq!(result, Err(Error::Device(DeviceError::Timeout)));
    // Not retried by the service.
    assert_eq!(dev.writes(), vec![DeviceCall::SetPower(true)]);
}

#[test]
fn eco_preset_hands_device_to_pid() {
    let mut svc = unmanaged_service();
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetPreset(Preset::Eco), &mut dev, &mut sink).unwrap();
    assert!(svc.pid_managed());
    assert!(svc.is_state_dirty());
    assert!(dev.calls.is_empty());

    // Default PID target is 10 °C, the room is at 20 °C.
    let outcome = svc.on_tick(at(0), &mut dev, &mut sink);
    assert!(matches!(outcome, TickOutcome::Decided { action: Action::TurnOff, .. }));
    assert!(svc.duty_cycle().last_transition().is_some());

    send(&mut svc, AppCommand::SetPreset(Preset::None), &mut dev, &mut sink).unwrap();
    assert!(!svc.pid_managed());
    assert_eq!(svc.duty_cycle().last_transition(), None);
    assert_eq!(svc.on_tick(at(300), &mut dev, &mut sink), TickOutcome::Unmanaged);
    assert_eq!(svc.last_action(), None);
}

#[test]
fn repeated_preset_is_a_no_op() {
    let mut svc = managed_service(20.0, |_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();

    send(&mut svc, AppCommand::SetPreset(Preset::None), &mut dev, &mut sink).unwrap();
    assert!(!svc.is_state_dirty());
    assert_eq!(svc.preset(), Preset::None);
}
