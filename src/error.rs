//! Unified error types for the FilterChlorine firmware.
//!
//! A single `Error` enum that every subsystem converts into, plus the
//! [`FaultKind`] catalogue of degraded conditions.  Faults never abort
//! the loop: they become state flags surfaced in the next telemetry
//! snapshot and one diagnostic log entry.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The power sensor could not be initialised or read.
    Sensor(SensorError),
    /// The WiFi driver refused an operation.
    Link(LinkError),
    /// The MQTT client refused an operation.
    Broker(BrokerError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A telemetry payload did not fit its buffer.
    Encode,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Encode => write!(f, "telemetry payload overflow"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Device did not acknowledge on the bus.
    NotPresent,
    /// I2C transaction failed mid-read.
    BusFault,
    /// Read attempted on a sensor that never initialised.
    NotInitialized,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPresent => write!(f, "device not present"),
            Self::BusFault => write!(f, "I2C bus fault"),
            Self::NotInitialized => write!(f, "sensor not initialised"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    DriverRejected,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::DriverRejected => write!(f, "WiFi driver rejected request"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Connect attempt refused (bad credentials, unreachable host).
    Rejected,
    /// Operation requires an established session.
    NotConnected,
    /// Publish or subscribe could not be queued by the client.
    Backpressure,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "connect rejected"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Backpressure => write!(f, "client outbox full"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// Degraded-mode catalogue
// ---------------------------------------------------------------------------

/// Conditions the node tolerates and reports rather than aborting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Power sensor absent at startup: integrator permanently skipped.
    SensorInitFailure,
    /// Motor driver failed to initialise: duty cycle permanently skipped.
    ActuatorUnavailable,
    /// Resistance requested at near-zero current: sentinel reported.
    DivideByZeroGuard,
    /// Non-auth WiFi disconnect: short backoff.
    NetworkTransientFailure,
    /// Credential/handshake/timeout disconnect: long backoff.
    NetworkAuthFailure,
    /// Broker refused a connect while the link was up.
    BrokerConnectFailure,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorInitFailure => write!(f, "sensor init failure"),
            Self::ActuatorUnavailable => write!(f, "actuator unavailable"),
            Self::DivideByZeroGuard => write!(f, "near-zero current, resistance sentinel"),
            Self::NetworkTransientFailure => write!(f, "transient network failure"),
            Self::NetworkAuthFailure => write!(f, "network auth failure"),
            Self::BrokerConnectFailure => write!(f, "broker connect failure"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
