//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (power sensor, motor driver, status LED, WiFi, MQTT,
//! event sinks) implement these traits.  The
//! [`NodeService`](super::service::NodeService) consumes them via
//! generics, so the domain core never touches hardware or the network
//! stack directly.

use crate::config::Topic;
use crate::error::{BrokerError, LinkError, SensorError};
use crate::motor::Direction;
use crate::net::ConnStatus;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One uncalibrated reading from the power monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawPowerReading {
    pub shunt_millivolts: f32,
    pub bus_volts: f32,
    /// Current as reported by the device, before the calibration multiplier.
    pub current_milliamps: f32,
}

/// Read-side port for the power monitor.
pub trait SensorPort {
    /// Result of the one-time initialisation at boot.
    fn initialized(&self) -> bool;

    /// Read shunt voltage, bus voltage and current in one go.
    fn read_raw(&mut self) -> Result<RawPowerReading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the bidirectional motor driver.
pub trait ActuatorPort {
    /// Result of the one-time initialisation at boot.
    fn available(&self) -> bool;

    /// Apply direction and PWM speed.
    fn drive(&mut self, direction: Direction, speed: u16);

    /// Zero the PWM output.  Direction is left as it was.
    fn stop(&mut self);

    fn is_forward(&self) -> bool;

    fn current_speed(&self) -> u16;
}

/// RGB status indicator.
pub trait IndicatorPort {
    fn set_led(&mut self, r: u8, g: u8, b: u8);
}

// ───────────────────────────────────────────────────────────────
// Network ports
// ───────────────────────────────────────────────────────────────

/// Station-mode WiFi driver.
///
/// Every call only *starts* an operation.  Outcomes arrive later as
/// [`LinkEvent`](crate::net::link::LinkEvent)s posted from the driver's
/// event context.
pub trait LinkDriver {
    /// Full association: tear down any previous state and join with the
    /// stored credentials.
    fn begin(&mut self) -> Result<(), LinkError>;

    /// Lightweight reconnect reusing the current configuration.
    fn reconnect(&mut self) -> Result<(), LinkError>;

    /// Leave the network on request.
    fn disconnect(&mut self);

    /// Signal strength in dBm while associated.
    fn rssi(&self) -> Option<i8>;
}

/// One message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub payload: heapless::Vec<u8, INBOUND_PAYLOAD_LEN>,
}

/// Largest inbound payload kept; longer payloads are truncated.
pub const INBOUND_PAYLOAD_LEN: usize = 256;

/// MQTT client session.
pub trait BrokerClient {
    /// Session state as the client library sees it.
    fn session(&self) -> ConnStatus;

    /// Start a session.  May complete synchronously (`session()` is
    /// `Connected` on return) or later.
    fn connect(&mut self, client_id: &str) -> Result<(), BrokerError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Next message received since the last call, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Drop the session without waiting for the broker.
    fn close(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
