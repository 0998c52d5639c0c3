//! Discrete-time PID regulator.
//!
//! - Fixed minimum sample interval: calls arriving sooner return the
//!   previous output untouched
//! - Integral anti-windup: the accumulator is clamped so that
//!   `P + I` stays inside the output limits
//! - Derivative-on-measurement, so setpoint steps do not kick the output
//!
//! ```ignore
//! let mut pid = PidRegulator::new(PidGains::new(100.0, 40.0, 60.0), Duration::from_secs(300), 0.0, 100.0);
//! let out = pid.compute(20.0, 22.0, now);
//! ```

use embassy_time::{Duration, Instant};

use super::tuning::PidGains;

/// PID regulator state. Owned by exactly one control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PidRegulator {
    gains: PidGains,
    sample_interval: Duration,
    out_min: f32,
    out_max: f32,

    last_input: f32,
    last_output: f32,
    integral: f32,
    /// `None` until the first effective update.
    last_sample: Option<Instant>,
}

impl PidRegulator {
    /// Create a regulator with a zeroed accumulator.
    ///
    /// Limits are expected to be validated by the caller
    /// (`out_min <= out_max`).
    pub fn new(gains: PidGains, sample_interval: Duration, out_min: f32, out_max: f32) -> Self {
        Self {
            gains,
            sample_interval,
            out_min,
            out_max,
            last_input: 0.0,
            last_output: clamp(0.0, out_min, out_max),
            integral: 0.0,
            last_sample: None,
        }
    }

    /// Run one PID step.
    ///
    /// The first call behaves as if exactly one sample interval had
    /// elapsed and has no derivative contribution.
    pub fn compute(&mut self, measured: f32, setpoint: f32, now: Instant) -> f32 {
        if !measured.is_finite() || !setpoint.is_finite() {
            return self.last_output;
        }

        let (elapsed, first) = match self.last_sample {
            None => (self.sample_interval, true),
            Some(prev) => match now.checked_duration_since(prev) {
                Some(elapsed) => (elapsed, false),
                // Clock went backwards: treat as "too soon".
                None => return self.last_output,
            },
        };
        if elapsed < self.sample_interval {
            return self.last_output;
        }
        let dt = secs(elapsed);

        let error = setpoint - measured;

        let p = self.gains.kp * error;

        self.integral += self.gains.ki * error * dt;
        self.integral = clamp(self.integral, self.out_min - p, self.out_max - p);
        // An overflowing P term leaves no room for the accumulator.
        if !self.integral.is_finite() {
            self.integral = 0.0;
        }

        let d = if first || dt <= 0.0 {
            0.0
        } else {
            -self.gains.kd * (measured - self.last_input) / dt
        };

        let raw = p + self.integral + d;
        let output = if raw.is_nan() {
            // inf - inf: saturate towards the error.
            if error > 0.0 { self.out_max } else { self.out_min }
        } else {
            clamp(raw, self.out_min, self.out_max)
        };

        self.last_output = output;
        self.last_input = measured;
        self.last_sample = Some(now);

        output
    }

    /// Zero the accumulator and forget the last sample.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_input = 0.0;
        self.last_output = clamp(0.0, self.out_min, self.out_max);
        self.last_sample = None;
    }

    /// Last computed output.
    pub fn output(&self) -> f32 {
        self.last_output
    }

    /// Current integral accumulator.
    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.out_min, self.out_max)
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }
}

/// Duration as fractional seconds.
pub(crate) fn secs(d: Duration) -> f32 {
    d.as_micros() as f32 / 1_000_000.0
}

#[inline]
fn clamp(x: f32, min: f32, max: f32) -> f32 {
    if x < min {
        min
    } else if x > max {
        max
    } else {
        x
    }
}
