//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade. A dashboard or MQTT adapter would implement the same
//! trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`], prefixed with the device name.
pub struct LogEventSink {
    name: String,
}

impl LogEventSink {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_owned() }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let name = &self.name;
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "{name} TELEM | T={} target={} pid_target={:.1} | out={:.1} action={:?} | \
                     mode={:?} action={:?} preset={:?} | kp={:.3} ki={:.4} kd={:.2}{}",
                    fmt_temp(t.measured_temp),
                    fmt_temp(t.device_target_temp),
                    t.pid_target_temp,
                    t.control_output,
                    t.action,
                    t.hvac_mode,
                    t.hvac_action,
                    t.preset,
                    t.gains.kp,
                    t.gains.ki,
                    t.gains.kd,
                    if t.autotuning { " | autotuning" } else { "" },
                );
            }
            AppEvent::Started(g) => {
                info!("{name} START | kp={} ki={} kd={}", g.kp, g.ki, g.kd);
            }
            AppEvent::TickFailed(e) => {
                warn!("{name} TICK  | skipped: {}", e);
            }
            AppEvent::ActuationFailed { action, error } => {
                warn!("{name} ACT   | {:?} failed: {}", action, error);
            }
            AppEvent::ActuatorSwitched { on, target } => {
                info!(
                    "{name} ACT   | heater {} (target {target})",
                    if *on { "ON" } else { "OFF" }
                );
            }
            AppEvent::AutotuneStarted { rule, setpoint } => {
                info!("{name} TUNE  | {rule} started at {setpoint}");
            }
            AppEvent::AutotuneConverged { rule, gains } => {
                info!(
                    "{name} TUNE  | {rule} converged: kp={} ki={} kd={}",
                    gains.kp, gains.ki, gains.kd
                );
            }
            AppEvent::AutotuneFailed(e) => {
                warn!("{name} TUNE  | failed: {}", e);
            }
        }
    }
}

fn fmt_temp(t: Option<f32>) -> String {
    match t {
        Some(t) => format!("{t:.1}\u{00b0}C"),
        None => "--".to_owned(),
    }
}
