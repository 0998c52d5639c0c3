//! Periodic tick source for the control loop.
//!
//! The control loop has exactly one trigger: a tick every
//! `check_interval`. [`TickSchedule`] decides when that tick is due. It
//! never queues: if the host falls behind (a slow device call, a suspended
//! laptop) every missed tick collapses into a single "run once, now" and
//! the schedule keeps its original phase.
//!
//! ```text
//!   due    due    due    due
//!    |------|------|------|------|
//!    ^ fire        ^ late: fire once, 1 collapsed
//! ```

use embassy_time::{Duration, Instant};
use log::debug;

/// Fixed-interval tick schedule with collapse-on-late semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSchedule {
    interval: Duration,
    /// `None` until first polled; the first poll always fires.
    next_due: Option<Instant>,
    fired: u64,
    collapsed: u64,
}

impl TickSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            fired: 0,
            collapsed: 0,
        }
    }

    /// Returns `true` if a tick is due at `now`, and consumes it.
    pub fn poll(&mut self, now: Instant) -> bool {
        let due = *self.next_due.get_or_insert(now);
        let Some(late) = now.checked_duration_since(due) else {
            return false;
        };

        let interval_us = self.interval.as_micros().max(1);
        let missed = late.as_micros() / interval_us;
        if missed > 0 {
            self.collapsed += missed;
            debug!("TickSchedule: {} missed tick(s) collapsed", missed);
        }

        let step = Duration::from_micros(interval_us.saturating_mul(missed + 1));
        self.next_due = Some(due + step);
        self.fired += 1;
        true
    }

    /// Time until the next tick is due; zero if due now.
    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.next_due {
            None => Duration::from_ticks(0),
            Some(due) => due
                .checked_duration_since(now)
                .unwrap_or(Duration::from_ticks(0)),
        }
    }

    /// Restart the schedule so the next poll fires immediately.
    pub fn reset(&mut self) {
        self.next_due = None;
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks delivered.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Ticks dropped because they came due while the host was behind.
    pub fn collapsed(&self) -> u64 {
        self.collapsed
    }
}
