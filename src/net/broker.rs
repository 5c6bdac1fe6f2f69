//! MQTT broker automaton.
//!
//! Keeps one broker session alive on top of the WiFi link:
//!
//! - link not `Connected` → session forced to `Disconnected`, no attempts
//! - link `Connected`, session down → attempt immediately the first time,
//!   then at most once per retry interval
//! - session established → re-subscribe every configured topic
//! - session restored by the client itself → adopted without a new connect
//!
//! Outbound publishes are dropped, never queued, while no session is up.

use heapless::Vec;
use log::{debug, info, warn};

use crate::app::ports::{BrokerClient, InboundMessage};
use crate::config::{MAX_SUBSCRIPTIONS, NodeConfig, Topic};
use crate::error::BrokerError;
use crate::net::ConnStatus;
use crate::scheduler::reached;

/// Payloads that request a firmware update.
const UPDATE_REQUESTS: [&[u8]; 2] = [b"OTA_UPDATE", b"UPDATE"];

impl InboundMessage {
    pub fn is_update_request(&self) -> bool {
        UPDATE_REQUESTS.contains(&self.payload.as_slice())
    }
}

/// What changed during one [`BrokerAutomaton::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerTransition {
    /// Session established and subscriptions renewed.
    Up,
    /// Established session lost while the link stayed up.
    Down,
    /// Connect attempt refused.
    Rejected,
    /// Session torn down because the link went away.
    LinkLost,
}

/// Result of [`BrokerAutomaton::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    /// No session; the payload was discarded.
    Dropped,
    Failed(BrokerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerState {
    pub status: ConnStatus,
    /// Time of the most recent connect attempt.
    pub last_attempt_at_ms: u32,
    pub first_attempt: bool,
    pub subscriptions: Vec<Topic, MAX_SUBSCRIPTIONS>,
}

pub struct BrokerAutomaton {
    state: BrokerState,
    retry_ms: u32,
    client_id: heapless::String<24>,
    dropped: u32,
}

impl BrokerAutomaton {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            state: BrokerState {
                status: ConnStatus::Disconnected,
                last_attempt_at_ms: 0,
                first_attempt: true,
                subscriptions: config.subscriptions.clone(),
            },
            retry_ms: config.broker_retry_ms,
            client_id: config.client_id.clone(),
            dropped: 0,
        }
    }

    /// Step the session towards `Connected`, gated on the link status.
    pub fn advance(
        &mut self,
        now_ms: u32,
        link: ConnStatus,
        client: &mut impl BrokerClient,
        mut report: impl FnMut(BrokerTransition),
    ) {
        if !link.is_connected() {
            if self.state.status != ConnStatus::Disconnected {
                client.close();
                self.state.status = ConnStatus::Disconnected;
                info!("Broker: link down, session closed");
                report(BrokerTransition::LinkLost);
            }
            return;
        }

        match self.state.status {
            ConnStatus::Connected => {
                if client.session() != ConnStatus::Connected {
                    self.state.status = ConnStatus::Disconnected;
                    warn!("Broker: session lost");
                    report(BrokerTransition::Down);
                }
            }
            ConnStatus::Connecting => match client.session() {
                ConnStatus::Connected => self.on_connected(client, &mut report),
                ConnStatus::Disconnected => {
                    self.state.status = ConnStatus::Disconnected;
                    warn!("Broker: connect failed, retry in {} ms", self.retry_ms);
                    report(BrokerTransition::Rejected);
                }
                ConnStatus::Connecting => {}
            },
            ConnStatus::Disconnected => {
                if client.session() == ConnStatus::Connected {
                    info!("Broker: client session already restored");
                    self.on_connected(client, &mut report);
                    return;
                }
                let due = self.state.first_attempt
                    || reached(now_ms, self.state.last_attempt_at_ms.wrapping_add(self.retry_ms));
                if due {
                    self.attempt(now_ms, client, &mut report);
                }
            }
        }
    }

    fn attempt(
        &mut self,
        now_ms: u32,
        client: &mut impl BrokerClient,
        report: &mut impl FnMut(BrokerTransition),
    ) {
        self.state.first_attempt = false;
        self.state.last_attempt_at_ms = now_ms;
        self.state.status = ConnStatus::Connecting;
        info!("Broker: connecting as '{}'", self.client_id);

        match client.connect(&self.client_id) {
            Ok(()) if client.session() == ConnStatus::Connected => self.on_connected(client, report),
            Ok(()) => {}
            Err(e) => {
                self.state.status = ConnStatus::Disconnected;
                warn!("Broker: connect failed ({}), retry in {} ms", e, self.retry_ms);
                report(BrokerTransition::Rejected);
            }
        }
    }

    fn on_connected(
        &mut self,
        client: &mut impl BrokerClient,
        report: &mut impl FnMut(BrokerTransition),
    ) {
        self.state.status = ConnStatus::Connected;
        for topic in &self.state.subscriptions {
            if let Err(e) = client.subscribe(topic) {
                warn!("Broker: subscribe '{}' failed ({})", topic, e);
            }
        }
        info!(
            "Broker: connected, {} subscription(s) renewed",
            self.state.subscriptions.len()
        );
        report(BrokerTransition::Up);
    }

    /// Publish if a session is up, otherwise drop the payload.
    pub fn publish(
        &mut self,
        client: &mut impl BrokerClient,
        topic: &str,
        payload: &[u8],
    ) -> PublishOutcome {
        if self.state.status != ConnStatus::Connected {
            self.dropped = self.dropped.wrapping_add(1);
            debug!("Broker: not connected, dropped {} bytes for '{}'", payload.len(), topic);
            return PublishOutcome::Dropped;
        }
        match client.publish(topic, payload) {
            Ok(()) => PublishOutcome::Sent,
            Err(e) => {
                warn!("Broker: publish to '{}' failed ({})", topic, e);
                PublishOutcome::Failed(e)
            }
        }
    }

    /// Next inbound message, only while a session is up.
    pub fn poll_inbound(&mut self, client: &mut impl BrokerClient) -> Option<InboundMessage> {
        if self.state.status != ConnStatus::Connected {
            return None;
        }
        client.poll_inbound()
    }

    pub fn status(&self) -> ConnStatus {
        self.state.status
    }

    pub fn state(&self) -> &BrokerState {
        &self.state
    }

    /// Publishes discarded for lack of a session since boot.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }
}
