//! Relay-feedback PID autotuning (Åström–Hägglund).
//!
//! The tuner replaces the regulator while it runs: it drives a virtual
//! relay around the setpoint, records the induced oscillation's peaks and,
//! once the amplitude has settled, derives the ultimate gain `Ku` and
//! ultimate period `Pu`. A [`TuningRule`] turns those into PID gains.
//!
//! ## Peak confirmation
//!
//! The tuner keeps a candidate extremum (the highest sample while looking
//! for a maximum, the lowest while looking for a minimum). A candidate is
//! confirmed as a peak once
//!
//! 1. no sample in the following `lookback` window went past it, and
//! 2. it lies at least `noiseband` away from the previous (opposite) peak.
//!
//! ## Convergence
//!
//! With the last five alternating peaks, the four half peak-to-peak
//! amplitudes must agree within [`PEAK_AMPLITUDE_TOLERANCE`] of their mean.
//! Sessions that never settle fail after [`MAX_PEAKS`] peaks or after the
//! configured maximum duration.

use core::f32::consts::PI;

use embassy_time::{Duration, Instant};
use heapless::Deque;
use log::{debug, info, warn};

use super::pid::secs;
use super::tuning::{PidGains, TuningRule};

/// Relative amplitude spread accepted as "settled".
pub const PEAK_AMPLITUDE_TOLERANCE: f32 = 0.05;

/// Peaks needed for one convergence check (2 full periods).
const CONVERGENCE_PEAKS: usize = 5;

/// Give up after this many confirmed peaks without convergence.
pub const MAX_PEAKS: u32 = 20;

/// Upper bound on the rolling sample window.
const HISTORY_CAPACITY: usize = 128;

/// Autotune session parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutotuneSettings {
    pub setpoint: f32,
    /// Relay amplitude added to / subtracted from zero output.
    pub out_step: f32,
    pub out_min: f32,
    pub out_max: f32,
    /// Hysteresis band around the setpoint, also the minimum peak spacing.
    pub noiseband: f32,
    pub lookback: Duration,
    /// Abort the session after this long without convergence.
    pub max_duration: Duration,
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutotuneState {
    /// Relay output is `+out_step`.
    RelayStepUp,
    /// Relay output is `-out_step`.
    RelayStepDown,
    /// Converged; gains are available.
    Succeeded,
    /// Gave up; see [`AutotuneError`].
    Failed(AutotuneError),
}

impl AutotuneState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Why a session stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutotuneError {
    /// [`MAX_PEAKS`] peaks seen but the amplitude never settled.
    TooManyPeaks,
    /// The maximum session duration elapsed.
    Timeout,
}

impl core::fmt::Display for AutotuneError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::TooManyPeaks => write!(f, "oscillation did not settle within {MAX_PEAKS} peaks"),
            Self::Timeout => write!(f, "maximum autotune duration elapsed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakKind {
    Min,
    Max,
}

impl PeakKind {
    fn opposite(self) -> Self {
        match self {
            Self::Min => Self::Max,
            Self::Max => Self::Min,
        }
    }

    /// True if `value` is at least as extreme as `than` in this direction.
    fn beats(self, value: f32, than: f32) -> bool {
        match self {
            Self::Min => value <= than,
            Self::Max => value >= than,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    at: Instant,
    value: f32,
}

/// A confirmed oscillation peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub at: Instant,
    pub value: f32,
    pub kind: PeakKind,
}

/// Relay-feedback autotuner. One instance per tuning session.
#[derive(Debug, Clone)]
pub struct Autotuner {
    settings: AutotuneSettings,
    state: AutotuneState,
    started: Option<Instant>,
    history: Deque<Sample, HISTORY_CAPACITY>,
    /// Kind of peak currently being looked for.
    peak_type: Option<PeakKind>,
    candidate: Option<Sample>,
    peaks: Deque<Peak, CONVERGENCE_PEAKS>,
    peak_count: u32,
    relay_output: f32,
    amplitude: f32,
    ku: f32,
    pu_secs: f32,
}

impl Autotuner {
    pub fn new(settings: AutotuneSettings) -> Self {
        Self {
            settings,
            state: AutotuneState::RelayStepUp,
            started: None,
            history: Deque::new(),
            peak_type: None,
            candidate: None,
            peaks: Deque::new(),
            peak_count: 0,
            relay_output: 0.0,
            amplitude: 0.0,
            ku: 0.0,
            pu_secs: 0.0,
        }
    }

    /// Feed one measurement.
    ///
    /// Returns `true` exactly once, on the call where convergence is
    /// detected. After that (or after a failure) further calls are no-ops
    /// returning `false`; inspect [`state`](Self::state) for the outcome.
    pub fn run(&mut self, measured: f32, now: Instant) -> bool {
        if self.state.is_finished() || !measured.is_finite() {
            return false;
        }

        let started = *self.started.get_or_insert(now);
        let Some(running_for) = now.checked_duration_since(started) else {
            return false;
        };
        if running_for >= self.settings.max_duration {
            self.fail(AutotuneError::Timeout);
            return false;
        }

        self.drive_relay(measured);

        let sample = Sample { at: now, value: measured };
        self.remember(sample);

        let window_full = running_for >= self.settings.lookback;
        let Some(peak) = self.track_peak(sample, window_full) else {
            return false;
        };

        self.peak_count += 1;
        if self.peaks.is_full() {
            self.peaks.pop_front();
        }
        let _ = self.peaks.push_back(peak);
        debug!(
            "autotune: {:?} peak {:.2} (#{} of max {})",
            peak.kind, peak.value, self.peak_count, MAX_PEAKS
        );

        if self.check_convergence() {
            self.state = AutotuneState::Succeeded;
            self.relay_output = 0.0;
            info!(
                "autotune: converged, amplitude={:.3} Ku={:.3} Pu={:.0}s",
                self.amplitude, self.ku, self.pu_secs
            );
            return true;
        }

        if self.peak_count >= MAX_PEAKS {
            self.fail(AutotuneError::TooManyPeaks);
        }
        false
    }

    /// Tuned gains for `rule`. `None` until the session has converged.
    pub fn tuned_gains(&self, rule: TuningRule) -> Option<PidGains> {
        (self.state == AutotuneState::Succeeded).then(|| rule.gains(self.ku, self.pu_secs))
    }

    /// Drive signal the caller should act on while tuning.
    pub fn output(&self) -> f32 {
        self.relay_output
    }

    pub fn state(&self) -> AutotuneState {
        self.state
    }

    pub fn settings(&self) -> &AutotuneSettings {
        &self.settings
    }

    pub fn peak_count(&self) -> u32 {
        self.peak_count
    }

    /// Ultimate gain (valid after convergence).
    pub fn ultimate_gain(&self) -> f32 {
        self.ku
    }

    /// Ultimate period in seconds (valid after convergence).
    pub fn ultimate_period_secs(&self) -> f32 {
        self.pu_secs
    }

    /// Induced oscillation amplitude (half peak-to-peak).
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    // ── Internal ──────────────────────────────────────────────

    fn drive_relay(&mut self, measured: f32) {
        let half_band = self.settings.noiseband / 2.0;
        if measured < self.settings.setpoint - half_band {
            self.state = AutotuneState::RelayStepUp;
        } else if measured > self.settings.setpoint + half_band {
            self.state = AutotuneState::RelayStepDown;
        }

        let raw = match self.state {
            AutotuneState::RelayStepUp => self.settings.out_step,
            AutotuneState::RelayStepDown => -self.settings.out_step,
            _ => 0.0,
        };
        self.relay_output = raw.max(self.settings.out_min).min(self.settings.out_max);
    }

    fn remember(&mut self, sample: Sample) {
        while let Some(oldest) = self.history.front() {
            let stale = sample
                .at
                .checked_duration_since(oldest.at)
                .is_some_and(|age| age > self.settings.lookback);
            if !stale && !self.history.is_full() {
                break;
            }
            self.history.pop_front();
        }
        let _ = self.history.push_back(sample);
    }

    /// Update the running candidate; return it if it is now a confirmed peak.
    fn track_peak(&mut self, sample: Sample, window_full: bool) -> Option<Peak> {
        let kind = *self.peak_type.get_or_insert(match self.state {
            AutotuneState::RelayStepDown => PeakKind::Min,
            _ => PeakKind::Max,
        });

        let candidate = match self.candidate {
            Some(c) if !kind.beats(sample.value, c.value) => c,
            _ => sample,
        };
        self.candidate = Some(candidate);

        if !window_full {
            return None;
        }
        let held = sample
            .at
            .checked_duration_since(candidate.at)
            .is_some_and(|d| d >= self.settings.lookback);
        if !held {
            return None;
        }
        if let Some(last) = self.peaks.back() {
            if (candidate.value - last.value).abs() < self.settings.noiseband {
                return None;
            }
        }

        // Confirmed. Look for the opposite extremum among what came after.
        let next = kind.opposite();
        self.peak_type = Some(next);
        self.candidate = self
            .history
            .iter()
            .filter(|s| s.at > candidate.at)
            .fold(None, |best: Option<Sample>, s| match best {
                Some(b) if !next.beats(s.value, b.value) => Some(b),
                _ => Some(*s),
            })
            .or(Some(sample));

        Some(Peak {
            at: candidate.at,
            value: candidate.value,
            kind,
        })
    }

    fn check_convergence(&mut self) -> bool {
        if self.peaks.len() < CONVERGENCE_PEAKS {
            return false;
        }
        let p: heapless::Vec<Peak, CONVERGENCE_PEAKS> = self.peaks.iter().copied().collect();

        let mut halves = [0.0_f32; CONVERGENCE_PEAKS - 1];
        for (i, half) in halves.iter_mut().enumerate() {
            *half = (p[i + 1].value - p[i].value).abs() / 2.0;
        }
        let mean = halves.iter().sum::<f32>() / halves.len() as f32;
        if mean <= 0.0 {
            return false;
        }
        let worst = halves
            .iter()
            .map(|a| (a - mean).abs())
            .fold(0.0_f32, f32::max);
        if worst / mean >= PEAK_AMPLITUDE_TOLERANCE {
            return false;
        }

        let period1 = p[3].at.checked_duration_since(p[1].at).unwrap_or(Duration::from_ticks(0));
        let period2 = p[4].at.checked_duration_since(p[2].at).unwrap_or(Duration::from_ticks(0));

        self.amplitude = mean;
        self.ku = 4.0 * self.settings.out_step / (PI * mean);
        self.pu_secs = 0.5 * (secs(period1) + secs(period2));
        true
    }

    fn fail(&mut self, err: AutotuneError) {
        warn!("autotune: giving up after {} peaks: {}", self.peak_count, err);
        self.state = AutotuneState::Failed(err);
        self.relay_output = 0.0;
    }
}
