//! Integration tests for autotune sessions driven through the service:
//! relay output reaching the device, hand-over to a freshly tuned
//! regulator, and stall handling.

use crate::mock_hw::{MockThermostat, RecordingSink, at, managed_service};

use embassy_time::Duration;
use pid_thermostat::adapters::time::ManualClock;
use pid_thermostat::app::commands::AppCommand;
use pid_thermostat::app::events::AppEvent;
use pid_thermostat::app::ports::Clock;
use pid_thermostat::app::service::{ThermostatService, TickOutcome};
use pid_thermostat::config::ThermostatConfig;
use pid_thermostat::control::{Action, AutotuneError, PidGains, TuningRule};

const SETPOINT: f32 = 22.0;

fn tuning_service(tweak: impl FnOnce(&mut ThermostatConfig)) -> ThermostatService {
    managed_service(SETPOINT, |c| {
        c.autotune = Some(TuningRule::NoOvershoot);
        c.noiseband = 0.5;
        c.autotune_lookback_secs = Some(60);
        c.sample_interval_secs = 5;
        c.check_interval_secs = 5;
        tweak(c);
    })
}

fn sine(t: u64, amplitude: f64, period: f64) -> f32 {
    let phase = 2.0 * core::f64::consts::PI * t as f64 / period;
    (f64::from(SETPOINT) + amplitude * phase.sin()) as f32
}

#[test]
fn start_begins_configured_session() {
    let mut svc = tuning_service(|_| {});
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);

    assert!(svc.autotuner().is_some());
    assert!(sink.events.contains(&AppEvent::AutotuneStarted {
        rule: TuningRule::NoOvershoot,
        setpoint: SETPOINT,
    }));
}

#[test]
fn relay_output_drives_the_duty_cycle() {
    let mut svc = tuning_service(|_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);

    dev.set_temp(20.0);
    let outcome = svc.on_tick(at(0), &mut dev, &mut sink);
    assert_eq!(outcome, TickOutcome::Decided { output: 100.0, action: Action::TurnOn });

    // Above the band the relay steps down; clamped at out_min = 0.
    dev.set_temp(23.0);
    let outcome = svc.on_tick(at(5), &mut dev, &mut sink);
    assert_eq!(outcome, TickOutcome::Decided { output: 0.0, action: Action::TurnOff });
    assert!(svc.telemetry().autotuning);
}

#[test]
fn convergence_hands_over_to_tuned_regulator() {
    let mut svc = tuning_service(|_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);

    let clock = ManualClock::new(at(0));
    let mut converged = None;
    for t in (0..6_000).step_by(5) {
        dev.set_temp(sine(t, 1.0, 600.0));
        svc.on_tick(clock.now(), &mut dev, &mut sink);
        if svc.autotuner().is_none() {
            converged = Some(t);
            break;
        }
        clock.advance(Duration::from_secs(5));
    }
    assert!(converged.is_some(), "autotune never finished");

    let gains = sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::AutotuneConverged { rule, gains } => {
                assert_eq!(*rule, TuningRule::NoOvershoot);
                Some(*gains)
            }
            _ => None,
        })
        .expect("no AutotuneConverged event");

    // Ku = 4 * 100 / (pi * 1), Pu = 600 s; no-overshoot divides Ku by 100.
    let expected = TuningRule::NoOvershoot.gains(4.0 * 100.0 / core::f32::consts::PI, 600.0);
    assert!((gains.kp - expected.kp).abs() / expected.kp < 0.05, "{gains:?}");
    assert!((gains.ki - expected.ki).abs() / expected.ki < 0.10, "{gains:?}");

    assert_eq!(svc.gains(), gains);
    assert_eq!(svc.regulator().gains(), gains);
    assert!(svc.is_state_dirty());
    assert!(!svc.telemetry().autotuning);
}

#[test]
fn stalled_session_times_out_and_keeps_gains() {
    let mut svc = tuning_service(|c| c.autotune_max_duration_secs = 3_600);
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);

    let clock = ManualClock::new(at(0));
    while clock.now() < at(4_000) {
        let t = clock.now().as_secs();
        dev.set_temp(15.0 + t as f32 / 1_000.0);
        svc.on_tick(clock.now(), &mut dev, &mut sink);
        clock.advance(Duration::from_secs(60));
    }

    assert!(svc.autotuner().is_none());
    assert_eq!(
        sink.count(|e| *e == AppEvent::AutotuneFailed(AutotuneError::Timeout)),
        1
    );
    assert_eq!(svc.gains(), PidGains::new(100.0, 40.0, 60.0));
    assert!(!svc.is_state_dirty());
}

#[test]
fn cancel_returns_control_to_the_regulator() {
    let mut svc = tuning_service(|_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);

    dev.set_temp(20.0);
    svc.on_tick(at(0), &mut dev, &mut sink);
    assert!(svc.duty_cycle().last_transition().is_some());

    svc.handle_command(AppCommand::CancelAutotune, at(5), &mut dev, &mut sink)
        .unwrap();
    assert!(svc.autotuner().is_none());
    assert_eq!(svc.duty_cycle().last_transition(), None);

    // The regulator takes over from a clean slate.
    assert!(matches!(
        svc.on_tick(at(10), &mut dev, &mut sink),
        TickOutcome::Decided { action: Action::TurnOn, .. }
    ));
    assert!(svc.regulator().integral() <= 0.0);
}

#[test]
fn start_autotune_command_uses_current_target() {
    let mut svc = managed_service(18.5, |_| {});
    let mut dev = MockThermostat::new();
    let mut sink = RecordingSink::new();
    svc.start(&mut sink);
    assert!(svc.autotuner().is_none());

    svc.handle_command(
        AppCommand::StartAutotune(TuningRule::TyreusLuyben),
        at(0),
        &mut dev,
        &mut sink,
    )
    .unwrap();

    let tuner = svc.autotuner().expect("session running");
    assert_eq!(tuner.settings().setpoint, 18.5);
    assert_eq!(tuner.settings().out_step, 100.0);
    assert!(dev.writes().is_empty());
}
