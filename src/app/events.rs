//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count in tests, etc.

use crate::error::FaultKind;
use crate::net::broker::BrokerTransition;
use crate::net::link::LinkTransition;
use crate::telemetry::TelemetrySnapshot;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started; carries the boot-time health of both
    /// peripherals.
    Started { sensor_healthy: bool, motor_available: bool },

    /// Snapshot built on a sample tick.
    Telemetry(TelemetrySnapshot),

    /// WiFi link came up, dropped, or began a reconnect.
    LinkChanged(LinkTransition),

    /// Broker session came up or went away.
    BrokerChanged(BrokerTransition),

    /// A degraded condition was entered.
    Fault(FaultKind),

    /// A firmware update was requested over MQTT.
    UpdateRequested,

    /// A reboot was requested from the console.
    RebootRequested,
}
