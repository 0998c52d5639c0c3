//! thermostat-sim: run PID-managed thermostats against simulated rooms.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │            edge_executor::LocalExecutor (one thread)          │
//! │                                                              │
//! │  script task ──AppCommand──▶ Channel ──▶ device task          │
//! │  (per device)                            │                   │
//! │                                          ▼                   │
//! │                  TickSchedule ─▶ ThermostatService.on_tick   │
//! │                                          │                   │
//! │                       SimulatedThermostat · LogEventSink      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `thermostat-sim [config.json]`. Without a file two demo devices
//! run for a simulated day. Time is accelerated by `speedup`.
#![deny(unused_must_use)]

use std::rc::Rc;

use anyhow::{Context, Result};
// Host critical-section impl for embassy-time's timer queue.
use critical_section as _;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant};
use log::{info, warn};
use serde::Deserialize;

use pid_thermostat::adapters::log_sink::LogEventSink;
use pid_thermostat::adapters::memory_store::MemoryStore;
use pid_thermostat::adapters::simulated::{RoomModel, SimulatedThermostat};
use pid_thermostat::adapters::time::HostClock;
use pid_thermostat::app::commands::AppCommand;
use pid_thermostat::app::ports::Clock;
use pid_thermostat::app::service::{Preset, ThermostatService};
use pid_thermostat::config::{PidActivation, ThermostatConfig};
use pid_thermostat::control::TuningRule;
use pid_thermostat::scheduler::TickSchedule;

/// Maximum simulated devices (executor task slots are two per device).
const MAX_DEVICES: usize = 4;
const COMMAND_DEPTH: usize = 8;
/// Room model integration step.
const PHYSICS_STEP: Duration = Duration::from_secs(60);

type CommandChannel = Channel<NoopRawMutex, AppCommand, COMMAND_DEPTH>;

// ── Simulation config ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SimConfig {
    /// Simulated seconds per wall-clock second.
    speedup: u32,
    duration_hours: u32,
    devices: Vec<SimDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SimDevice {
    thermostat: ThermostatConfig,
    initial_temp: f32,
    room: RoomParams,
    /// Inject one device timeout every N ticks (0 = never).
    timeout_every_ticks: u64,
    script: Vec<ScriptStep>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RoomParams {
    ambient: f32,
    heat_rate_per_hour: f32,
    loss_per_hour: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ScriptStep {
    at_secs: u64,
    command: AppCommand,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut living_room = SimDevice {
            timeout_every_ticks: 7,
            script: vec![
                ScriptStep { at_secs: 0, command: AppCommand::SetPreset(Preset::Eco) },
                ScriptStep { at_secs: 0, command: AppCommand::SetTargetTemperature(21.0) },
                ScriptStep { at_secs: 12 * 3600, command: AppCommand::SetTargetTemperature(19.0) },
            ],
            ..SimDevice::default()
        };
        living_room.thermostat.name = device_name("living-room");

        let mut workshop = SimDevice {
            initial_temp: 12.0,
            script: vec![
                ScriptStep { at_secs: 0, command: AppCommand::SetTargetTemperature(16.0) },
                ScriptStep {
                    at_secs: 600,
                    command: AppCommand::StartAutotune(TuningRule::NoOvershoot),
                },
            ],
            ..SimDevice::default()
        };
        workshop.thermostat.pid_activation = PidActivation::Always;
        workshop.thermostat.name = device_name("workshop");

        Self {
            speedup: 3600,
            duration_hours: 24,
            devices: vec![living_room, workshop],
        }
    }
}

fn device_name(name: &str) -> heapless::String<32> {
    let mut s = heapless::String::new();
    let _ = s.push_str(name);
    s
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            thermostat: ThermostatConfig::default(),
            initial_temp: 17.0,
            room: RoomParams::default(),
            timeout_every_ticks: 0,
            script: Vec::new(),
        }
    }
}

impl Default for RoomParams {
    fn default() -> Self {
        let m = RoomModel::default();
        Self {
            ambient: m.ambient,
            heat_rate_per_hour: m.heat_rate_per_hour,
            loss_per_hour: m.loss_per_hour,
        }
    }
}

impl RoomParams {
    fn model(&self) -> RoomModel {
        RoomModel {
            ambient: self.ambient,
            heat_rate_per_hour: self.heat_rate_per_hour,
            loss_per_hour: self.loss_per_hour,
            ..RoomModel::default()
        }
    }
}

fn load_config() -> Result<SimConfig> {
    let Some(path) = std::env::args().nth(1) else {
        info!("No config file given, running demo devices");
        return Ok(SimConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config: SimConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    Ok(config)
}

// ── Tasks ─────────────────────────────────────────────────────

/// Sleep on the reactor until `at` on the simulated clock.
async fn sleep_until(clock: &HostClock, at: Instant) {
    if let Some(wait) = at.checked_duration_since(clock.now()) {
        async_io_mini::Timer::after(clock.to_host(wait)).await;
    }
}

/// Replays a device's command script at its simulated timestamps.
async fn script_task(script: Vec<ScriptStep>, clock: Rc<HostClock>, commands: &CommandChannel) {
    let mut steps = script;
    steps.sort_by_key(|s| s.at_secs);
    for step in steps {
        sleep_until(&clock, Instant::from_secs(step.at_secs)).await;
        commands.send(step.command).await;
    }
}

struct DeviceSummary {
    name: String,
    final_temp: f32,
    ticks: u64,
    kp: f32,
    ki: f32,
    kd: f32,
}

/// One exclusive execution context per device: ticks never overlap.
async fn device_task(
    sim: SimDevice,
    clock: Rc<HostClock>,
    commands: &CommandChannel,
    until: Instant,
) -> DeviceSummary {
    let name = sim.thermostat.name.as_str().to_owned();
    let mut schedule = TickSchedule::new(sim.thermostat.check_interval());
    let mut device = SimulatedThermostat::new(sim.room.model(), sim.initial_temp);
    let mut sink = LogEventSink::new(&name);
    let mut store = MemoryStore::new();

    let mut service = match ThermostatService::new(sim.thermostat) {
        Ok(service) => service,
        Err(e) => {
            warn!("{name}: {e}");
            return DeviceSummary {
                name,
                final_temp: sim.initial_temp,
                ticks: 0,
                kp: 0.0,
                ki: 0.0,
                kd: 0.0,
            };
        }
    };
    match service.restore(&store) {
        Ok(true) => info!("{name}: state restored"),
        Ok(false) => info!("{name}: first boot"),
        Err(e) => warn!("{name}: restore failed: {e}"),
    }
    service.start(&mut sink);

    let mut last = clock.now();
    loop {
        let now = clock.now();
        if now >= until {
            break;
        }
        if let Some(dt) = now.checked_duration_since(last) {
            device.advance(dt);
        }
        last = now;

        if schedule.poll(now) {
            if sim.timeout_every_ticks > 0 && (schedule.fired() % sim.timeout_every_ticks) == 0 {
                device.inject_timeouts(1);
            }
            service.on_tick(now, &mut device, &mut sink);
            service.persist_if_dirty(&mut store);
        }

        let wait = schedule.time_until_due(now).min(PHYSICS_STEP);
        let command = futures_lite::future::or(
            async {
                async_io_mini::Timer::after(clock.to_host(wait)).await;
                None
            },
            async { Some(commands.receive().await) },
        )
        .await;

        if let Some(cmd) = command {
            info!("{name}: command {:?}", cmd);
            if let Err(e) = service.handle_command(cmd, clock.now(), &mut device, &mut sink) {
                warn!("{name}: {:?} failed: {e}", cmd);
            }
            service.persist_if_dirty(&mut store);
        }
    }

    let gains = service.gains();
    DeviceSummary {
        name,
        final_temp: device.room_temp(),
        ticks: service.tick_count(),
        kp: gains.kp,
        ki: gains.ki,
        kd: gains.kd,
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("thermostat-sim v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    if config.devices.len() > MAX_DEVICES {
        anyhow::bail!("at most {MAX_DEVICES} devices supported, got {}", config.devices.len());
    }
    for dev in &config.devices {
        dev.thermostat
            .validate()
            .with_context(|| format!("device {}", dev.thermostat.name))?;
    }

    let clock = Rc::new(HostClock::accelerated(config.speedup));
    let until = Instant::from_secs(u64::from(config.duration_hours) * 3600);
    info!(
        "Simulating {} device(s) for {}h at {}x",
        config.devices.len(),
        config.duration_hours,
        clock.speedup()
    );

    let channels: [CommandChannel; MAX_DEVICES] = core::array::from_fn(|_| Channel::new());
    let executor: edge_executor::LocalExecutor<'_, { 2 * MAX_DEVICES }> =
        edge_executor::LocalExecutor::new();

    let mut tasks = Vec::new();
    for (sim, commands) in config.devices.into_iter().zip(channels.iter()) {
        executor
            .spawn(script_task(sim.script.clone(), clock.clone(), commands))
            .detach();
        tasks.push(executor.spawn(device_task(sim, clock.clone(), commands, until)));
    }

    let summaries = futures_lite::future::block_on(executor.run(async {
        let mut summaries = Vec::new();
        for task in tasks {
            summaries.push(task.await);
        }
        summaries
    }));

    for s in summaries {
        info!(
            "{}: {:.2}\u{00b0}C after {} ticks, kp={:.3} ki={:.5} kd={:.2}",
            s.name, s.final_temp, s.ticks, s.kp, s.ki, s.kd
        );
    }
    Ok(())
}
