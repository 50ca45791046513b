//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the mock rig.  All tests run on the host with no real hardware
//! required.

mod autotune_tests;
mod mock_hw;
mod position_loop_tests;
mod service_tests;
