//! Sensor drivers.
//!
//! The node has a single sensor, the INA219 power monitor on the I2C
//! bus.  It is exposed to the domain through
//! [`SensorPort`](crate::app::ports::SensorPort) by the hardware adapter.

pub mod ina219;

pub use ina219::Ina219;
