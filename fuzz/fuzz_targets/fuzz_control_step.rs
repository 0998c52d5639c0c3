//! Fuzz target: `PidRegulator::compute` feeding `DutyCycle::decide`
//!
//! Interprets the input as a stream of (measured, setpoint, time step)
//! records and asserts the regulator output never leaves its limits and
//! the duty cycle never panics on whatever the regulator produces.
//!
//! cargo fuzz run fuzz_control_step

#![no_main]

use embassy_time::{Duration, Instant};
use critical_section as _;
use libfuzzer_sys::fuzz_target;
use pid_thermostat::control::{DutyCycle, PidGains, PidRegulator};

fn f32_at(data: &[u8], i: usize) -> f32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[i..i + 4]);
    f32::from_le_bytes(b)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let gains = PidGains::new(
        f32_at(data, 0).abs().min(1e4),
        f32_at(data, 4).abs().min(1e4),
        f32_at(data, 8).abs().min(1e4),
    );
    if !(gains.kp.is_finite() && gains.ki.is_finite() && gains.kd.is_finite()) {
        return;
    }

    let mut pid = PidRegulator::new(gains, Duration::from_secs(60), -100.0, 100.0);
    let mut duty = DutyCycle::new(Duration::from_secs(300));
    let mut now = Instant::from_secs(0);
    let mut on = false;

    for record in data[12..].chunks_exact(10) {
        let measured = f32_at(record, 0);
        let setpoint = f32_at(record, 4);
        let step = u16::from_le_bytes([record[8], record[9]]);
        now = now + Duration::from_secs(u64::from(step));

        let out = pid.compute(measured, setpoint, now);
        assert!((-100.0..=100.0).contains(&out), "output {out} out of range");

        let action = duty.decide(out, -100.0, 100.0, now, on);
        let switched = if DutyCycle::is_forced(out, -100.0, 100.0) {
            duty.record_forced(action, now)
        } else {
            duty.record(action, now)
        };
        if switched {
            on = duty.actuator_is_on();
        }
    }
});
