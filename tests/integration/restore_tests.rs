//! Integration tests for persisting and restoring service state across
//! restarts.

use crate::mock_hw::{MockThermostat, RecordingSink, at};

use embassy_time::Duration;
use pid_thermostat::Error;
use pid_thermostat::adapters::memory_store::MemoryStore;
use pid_thermostat::app::commands::AppCommand;
use pid_thermostat::app::ports::{StorageError, StoragePort};
use pid_thermostat::app::restore::{NAMESPACE, RestoredState};
use pid_thermostat::app::service::{HvacMode, Preset, ThermostatService};
use pid_thermostat::config::ThermostatConfig;
use pid_thermostat::control::{PidGains, PidRegulator};

const KEY: &str = "thermostat";

fn service() -> ThermostatService {
    ThermostatService::new(ThermostatConfig::default()).unwrap()
}

fn store_with(state: RestoredState) -> MemoryStore {
    let mut store = MemoryStore::new();
    state.save(&mut store, KEY).unwrap();
    store
}

#[test]
fn user_choices_survive_restart() {
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    let mut store = MemoryStore::new();

    let mut before = service();
    for cmd in [
        AppCommand::SetPreset(Preset::Eco),
        AppCommand::SetTargetTemperature(21.5),
        AppCommand::SetHvacMode(HvacMode::Heat),
    ] {
        before.handle_command(cmd, at(0), &mut dev, &mut sink).unwrap();
    }
    assert!(before.persist_if_dirty(&mut store));

    let mut after = service();
    assert!(after.restore(&store).unwrap());
    assert_eq!(after.preset(), Preset::Eco);
    assert_eq!(after.pid_target_temp(), 21.5);
    assert_eq!(after.last_on_mode(), HvacMode::Heat);
    assert_eq!(after.snapshot(), before.snapshot());
    assert!(after.pid_managed());
    assert!(!after.is_state_dirty());
}

#[test]
fn restored_gains_build_a_fresh_regulator() {
    let gains = PidGains::new(1.3, 0.002, 45.0);
    let store = store_with(RestoredState {
        preset: Preset::Eco,
        last_on_mode: HvacMode::Auto,
        pid_target_temp: 20.0,
        gains,
    });

    let mut svc = service();
    assert!(svc.restore(&store).unwrap());

    let fresh = PidRegulator::new(gains, Duration::from_secs(300), 0.0, 100.0);
    assert_eq!(svc.gains(), gains);
    assert_eq!(svc.regulator(), &fresh);
    assert_eq!(svc.telemetry().gains, gains);
    assert_eq!(svc.duty_cycle().last_transition(), None);
}

#[test]
fn services_restored_from_one_blob_agree() {
    let state = RestoredState {
        preset: Preset::Eco,
        last_on_mode: HvacMode::Auto,
        pid_target_temp: 21.0,
        gains: PidGains::new(10.0, 0.01, 0.0),
    };
    let store = store_with(state);
    let mut sink = RecordingSink::new();

    // Two services restored from the same blob behave identically.
    let mut a = service();
    let mut b = service();
    a.restore(&store).unwrap();
    b.restore(&store).unwrap();
    let mut dev_a = MockThermostat::new();
    let mut dev_b = MockThermostat::new();
    for (i, temp) in [18.0, 19.5, 20.5, 21.2].into_iter().enumerate() {
        dev_a.set_temp(temp);
        dev_b.set_temp(temp);
        let now = at(10_000 + i as u64 * 300);
        assert_eq!(
            a.on_tick(now, &mut dev_a, &mut sink),
            b.on_tick(now, &mut dev_b, &mut sink)
        );
    }
    assert_eq!(dev_a.calls, dev_b.calls);
}

#[test]
fn persist_only_when_dirty() {
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    let mut store = MemoryStore::new();
    let mut svc = service();

    assert!(!svc.persist_if_dirty(&mut store));
    assert!(store.is_empty());

    svc.handle_command(AppCommand::SetPreset(Preset::Eco), at(0), &mut dev, &mut sink)
        .unwrap();
    store.set_fail_writes(true);
    assert!(!svc.persist_if_dirty(&mut store));
    assert!(svc.is_state_dirty());

    store.set_fail_writes(false);
    assert!(svc.persist_if_dirty(&mut store));
    assert!(!svc.is_state_dirty());
    assert_eq!(store.len(), 1);
    assert!(!svc.persist_if_dirty(&mut store));
}

#[test]
fn corrupted_blob_is_reported_and_ignored() {
    let mut store = MemoryStore::new();
    store.write(NAMESPACE, KEY, &[0xFF; 6]).unwrap();

    let mut svc = service();
    assert_eq!(svc.restore(&store), Err(Error::Storage(StorageError::Corrupted)));
    assert_eq!(svc.preset(), Preset::None);
    assert_eq!(svc.gains(), PidGains::new(100.0, 40.0, 60.0));
}

#[test]
fn unusable_state_is_treated_as_first_boot() {
    let store = store_with(RestoredState {
        preset: Preset::Eco,
        last_on_mode: HvacMode::Heat,
        pid_target_temp: f32::NAN,
        gains: PidGains::new(1.0, 1.0, 1.0),
    });

    let mut svc = service();
    assert_eq!(svc.restore(&store), Ok(false));
    assert_eq!(svc.preset(), Preset::None);
    assert_eq!(svc.pid_target_temp(), 10.0);
}

#[test]
fn restored_off_mode_turns_on_into_auto() {
    let store = store_with(RestoredState {
        preset: Preset::None,
        last_on_mode: HvacMode::Off,
        pid_target_temp: 20.0,
        gains: PidGains::new(100.0, 40.0, 60.0),
    });

    let mut svc = service();
    assert!(svc.restore(&store).unwrap());
    assert_eq!(svc.last_on_mode(), HvacMode::Auto);
}

#[test]
fn first_boot_restores_nothing() {
    let mut svc = service();
    assert_eq!(svc.restore(&MemoryStore::new()), Ok(false));
    assert_eq!(svc.snapshot().pid_target_temp, 10.0);
}
