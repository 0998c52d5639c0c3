//! Time-proportioning (slow PWM) scheduler.
//!
//! Turns a continuous control output into ON/OFF decisions for a binary
//! actuator that can only be switched every few minutes. Within one PWM
//! period the actuator stays ON for `period * |output| / |limit|` and OFF
//! for the remainder; dwell times are measured from the last transition.
//! A forced decision (idle or full demand) restarts the dwell timer on
//! every tick it is applied, so a proportional phase that follows serves
//! a full dwell.
//!
//! | Output                         | Decision                          |
//! |--------------------------------|-----------------------------------|
//! | `0`                            | `TurnOff` (idle)                  |
//! | `out_max`, or `out_min` if < 0 | `TurnOn` (full demand)            |
//! | `0 < o < out_max`              | ON for `period * o / out_max`     |
//! | `out_min < o < 0`              | ON for `period * o / out_min`     |

use embassy_time::{Duration, Instant};

/// What the actuator should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    TurnOn,
    TurnOff,
    Hold,
}

/// Duty-cycle state, persisting across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct DutyCycle {
    pwm_period: Duration,
    last_transition: Option<Instant>,
    actuator_is_on: bool,
}

impl DutyCycle {
    pub fn new(pwm_period: Duration) -> Self {
        Self {
            pwm_period,
            last_transition: None,
            actuator_is_on: false,
        }
    }

    /// Decide what to do with the actuator now.
    ///
    /// `actuator_on` is the actuator's reported running state. Before the
    /// first recorded transition every dwell time counts as satisfied.
    pub fn decide(
        &self,
        output: f32,
        out_min: f32,
        out_max: f32,
        now: Instant,
        actuator_on: bool,
    ) -> Action {
        if is_idle(output) {
            return Action::TurnOff;
        }
        if is_saturated(output, out_min, out_max) {
            return Action::TurnOn;
        }

        let (time_on, time_off) = self.split(output, out_min, out_max);
        let satisfied = |dwell: Duration| match self.last_transition {
            None => true,
            Some(at) => now
                .checked_duration_since(at)
                .is_some_and(|elapsed| elapsed >= dwell),
        };

        if actuator_on {
            if satisfied(time_on) {
                Action::TurnOff
            } else {
                Action::Hold
            }
        } else if satisfied(time_off) {
            Action::TurnOn
        } else {
            Action::Hold
        }
    }

    /// ON / OFF durations for one PWM period at `output`.
    pub fn split(&self, output: f32, out_min: f32, out_max: f32) -> (Duration, Duration) {
        let fraction = if output > 0.0 && out_max > 0.0 {
            output / out_max
        } else if output < 0.0 && out_min < 0.0 {
            output / out_min
        } else {
            0.0
        };
        let fraction = f64::from(fraction.clamp(0.0, 1.0));

        let period_us = self.pwm_period.as_micros();
        let on_us = (period_us as f64 * fraction).round() as u64;
        let on_us = on_us.min(period_us);
        (
            Duration::from_micros(on_us),
            Duration::from_micros(period_us - on_us),
        )
    }

    /// Record an applied action. Returns `true` if the actuator changed
    /// state, in which case the dwell timer restarts at `now`.
    pub fn record(&mut self, action: Action, now: Instant) -> bool {
        let on = match action {
            Action::TurnOn => true,
            Action::TurnOff => false,
            Action::Hold => return false,
        };
        if self.last_transition.is_some() && self.actuator_is_on == on {
            return false;
        }
        self.actuator_is_on = on;
        self.last_transition = Some(now);
        true
    }

    /// Record an applied idle or full-demand action. The dwell timer
    /// restarts at `now` whether or not the actuator changed state.
    /// Returns `true` if it changed.
    pub fn record_forced(&mut self, action: Action, now: Instant) -> bool {
        let on = match action {
            Action::TurnOn => true,
            Action::TurnOff => false,
            Action::Hold => return false,
        };
        let changed = self.last_transition.is_none() || self.actuator_is_on != on;
        self.actuator_is_on = on;
        self.last_transition = Some(now);
        changed
    }

    /// Whether `output` bypasses the proportional split.
    pub fn is_forced(output: f32, out_min: f32, out_max: f32) -> bool {
        is_idle(output) || is_saturated(output, out_min, out_max)
    }

    /// Forget dwell history (control authority changed hands).
    pub fn reset(&mut self) {
        self.last_transition = None;
        self.actuator_is_on = false;
    }

    /// Time remaining before the pending switch, if any.
    pub fn remaining(&self, dwell: Duration, now: Instant) -> Option<Duration> {
        let at = self.last_transition?;
        let elapsed = now.checked_duration_since(at)?;
        dwell.checked_sub(elapsed)
    }

    pub fn pwm_period(&self) -> Duration {
        self.pwm_period
    }

    pub fn actuator_is_on(&self) -> bool {
        self.actuator_is_on
    }

    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }
}

fn is_idle(output: f32) -> bool {
    output == 0.0 || output.is_nan()
}

fn is_saturated(output: f32, out_min: f32, out_max: f32) -> bool {
    (output >= out_max && out_max > 0.0) || (output <= out_min && out_min < 0.0)
}
