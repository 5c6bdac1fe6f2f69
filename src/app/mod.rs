//! Application core: pure domain logic, zero I/O.
//!
//! The [`service::NodeService`] owns every piece of runtime state and is
//! driven by a single cooperative loop.  All interaction with hardware
//! and the network happens through the **port traits** in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
