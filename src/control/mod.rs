//! Control algorithms: PID regulator, relay autotuner and the duty-cycle
//! scheduler that maps a continuous output onto an ON/OFF actuator.
//!
//! Nothing in here performs I/O or reads a clock; every operation takes
//! the current [`Instant`](embassy_time::Instant) as an argument.

pub mod autotune;
pub mod duty_cycle;
pub mod pid;
pub mod tuning;

pub use autotune::{AutotuneError, AutotuneSettings, AutotuneState, Autotuner};
pub use duty_cycle::{Action, DutyCycle};
pub use pid::PidRegulator;
pub use tuning::{PidGains, TuningRule};
