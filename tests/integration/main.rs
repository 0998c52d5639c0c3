//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters. All tests run on the host with synthetic time;
//! no thermostat or network required.

mod autotune_flow_tests;
mod command_tests;
mod mock_hw;
mod restore_tests;
