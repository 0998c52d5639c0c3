//! Fuzz target: `RestoredState::load`
//!
//! Stores arbitrary bytes as the persisted blob and asserts that loading
//! either fails with a typed error or yields a state that re-encodes.
//!
//! cargo fuzz run fuzz_restore_blob

#![no_main]

use critical_section as _;
use libfuzzer_sys::fuzz_target;
use pid_thermostat::adapters::memory_store::MemoryStore;
use pid_thermostat::app::ports::StoragePort;
use pid_thermostat::app::restore::{NAMESPACE, RestoredState};

fuzz_target!(|data: &[u8]| {
    let mut store = MemoryStore::new();
    if store.write(NAMESPACE, "fuzz", data).is_err() {
        return;
    }
    if let Ok(Some(state)) = RestoredState::load(&store, "fuzz") {
        let mut out = MemoryStore::new();
        assert!(state.save(&mut out, "fuzz").is_ok());
    }
});
