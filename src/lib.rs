//! FilterChlorine node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and host-side
//! simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod motor;
pub mod net;
pub mod power;
pub mod scheduler;
pub mod telemetry;

pub mod error;
pub mod pins;

pub mod adapters;
pub mod drivers;
pub mod sensors;
