//! Clock adapters.
//!
//! Implement [`Clock`] for the control loop.
//!
//! - [`HostClock`] wraps `std::time::Instant` and maps elapsed host time
//!   onto an `embassy_time::Instant`, optionally accelerated for
//!   simulation.
//! - [`ManualClock`] only moves when told to; tests drive it.

use core::cell::Cell;

use embassy_time::{Duration, Instant};

use crate::app::ports::Clock;

/// Monotonic host clock starting at zero.
pub struct HostClock {
    start: std::time::Instant,
    speedup: u32,
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self::accelerated(1)
    }

    /// Clock running `speedup` times faster than wall time.
    pub fn accelerated(speedup: u32) -> Self {
        Self {
            start: std::time::Instant::now(),
            speedup: speedup.max(1),
        }
    }

    pub fn speedup(&self) -> u32 {
        self.speedup
    }

    /// Host wall time corresponding to `d` of clock time.
    pub fn to_host(&self, d: Duration) -> std::time::Duration {
        std::time::Duration::from_micros(d.as_micros() / u64::from(self.speedup))
    }
}

impl Clock for HostClock {
    fn now(&self) -> Instant {
        let elapsed_us = self.start.elapsed().as_micros() as u64;
        Instant::from_micros(elapsed_us.saturating_mul(u64::from(self.speedup)))
    }
}

/// Hand-driven clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, at: Instant) {
        self.now.set(at);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
