//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements     | Connects to                     |
//! |----------------|----------------|---------------------------------|
//! | `log_sink`     | EventSink      | `log` facade                    |
//! | `memory_store` | StoragePort    | in-memory map                   |
//! | `simulated`    | ThermostatPort | first-order room model          |
//! | `time`         | Clock          | host monotonic clock / manual   |

pub mod log_sink;
pub mod memory_store;
pub mod simulated;
pub mod time;
