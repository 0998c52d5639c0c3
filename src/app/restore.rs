//! State restored across restarts.
//!
//! Only user-facing choices and the effective gains survive a restart.
//! The regulator accumulator, autotune history and duty-cycle timing are
//! always rebuilt fresh, so a restarted loop behaves exactly like a new
//! one fed the same gains.
//!
//! Blobs are `postcard`-encoded under the `thermostat` namespace, keyed by
//! device name.

use serde::{Deserialize, Serialize};

use crate::control::PidGains;
use crate::error::{Result, StorageError};

use super::ports::StoragePort;
use super::service::{HvacMode, Preset};

/// Storage namespace for restored thermostat state.
pub const NAMESPACE: &str = "thermostat";

/// Upper bound on an encoded [`RestoredState`].
const MAX_BLOB_LEN: usize = 64;

/// Persisted subset of the service state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestoredState {
    pub preset: Preset,
    pub last_on_mode: HvacMode,
    pub pid_target_temp: f32,
    pub gains: PidGains,
}

impl RestoredState {
    /// Load the state stored for `key`. `Ok(None)` on first boot.
    pub fn load(storage: &impl StoragePort, key: &str) -> Result<Option<Self>> {
        if !storage.exists(NAMESPACE, key) {
            return Ok(None);
        }
        let mut buf = [0u8; MAX_BLOB_LEN];
        let len = storage.read(NAMESPACE, key, &mut buf)?;
        let state = postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        Ok(Some(state))
    }

    /// Encode and store under `key`.
    pub fn save(&self, storage: &mut impl StoragePort, key: &str) -> Result<()> {
        let mut buf = [0u8; MAX_BLOB_LEN];
        let bytes = postcard::to_slice(self, &mut buf).map_err(|_| StorageError::IoError)?;
        storage.write(NAMESPACE, key, bytes)?;
        Ok(())
    }

    /// True if every numeric field is usable by the regulator.
    pub fn is_sane(&self) -> bool {
        let PidGains { kp, ki, kd } = self.gains;
        self.pid_target_temp.is_finite()
            && [kp, ki, kd].iter().all(|g| g.is_finite() && *g >= 0.0)
    }
}
