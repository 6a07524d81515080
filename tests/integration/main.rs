//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against
//! mock adapters. Everything runs on the host with no hardware.

mod controller_tests;
mod light_tests;
mod mock_hw;
mod router_tests;
