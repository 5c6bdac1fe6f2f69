//! Connectivity automata.
//!
//! ```text
//!   WiFi driver ──events──▶ LinkAutomaton ──status──▶ BrokerAutomaton ──▶ MQTT client
//! ```
//!
//! Both automata are advanced once per scheduler call and never block.
//! The broker automaton only ever attempts a session while the link is
//! `Connected`.

pub mod broker;
pub mod link;

/// Connection status shared by the link and the broker automata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}
