//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises a subsystem against
//! mock hardware and the host simulations of the WiFi and MQTT adapters.
//! All tests run on the host with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod connectivity_tests;
mod mock_hw;
mod node_service_tests;
