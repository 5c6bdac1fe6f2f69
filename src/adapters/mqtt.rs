//! MQTT client adapter.
//!
//! Implements [`BrokerClient`].  Session state and inbound messages are
//! shared with the client's event context through a [`Session`] so the
//! broker automaton can poll them without blocking.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient`, with its connection
//!   pumped on a dedicated thread.  Each `connect` builds a fresh client
//!   and a fresh [`Session`]; a stale pump thread can only touch the
//!   session it was started with.
//! - **all other targets**: a scripted broker that records publishes and
//!   lets tests inject inbound messages.

use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::{BrokerClient, INBOUND_PAYLOAD_LEN, InboundMessage};
use crate::config::Topic;
use crate::error::BrokerError;
use crate::net::ConnStatus;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

/// Inbound messages buffered between two scheduler invocations.
const INBOUND_QUEUE_DEPTH: usize = 8;

// ───────────────────────────────────────────────────────────────
// Session mailbox
// ───────────────────────────────────────────────────────────────

/// State written by the client's event context, read by the automaton.
pub struct Session {
    status: AtomicU8,
    inbound: Channel<CriticalSectionRawMutex, InboundMessage, INBOUND_QUEUE_DEPTH>,
}

impl Session {
    fn new(status: ConnStatus) -> Self {
        Self {
            status: AtomicU8::new(encode(status)),
            inbound: Channel::new(),
        }
    }

    pub fn status(&self) -> ConnStatus {
        decode(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: ConnStatus) {
        self.status.store(encode(status), Ordering::Release);
    }

    /// Queue a received message.  Oversized payloads are truncated,
    /// over-long topics and a full queue drop the message.
    fn deliver(&self, topic: &str, data: &[u8]) -> bool {
        let Ok(topic) = Topic::try_from(topic) else {
            warn!("MQTT: dropping message on over-long topic '{}'", topic);
            return false;
        };
        let keep = data.len().min(INBOUND_PAYLOAD_LEN);
        if keep < data.len() {
            warn!("MQTT: payload on '{}' truncated to {} bytes", topic, keep);
        }
        let mut payload = heapless::Vec::new();
        // Cannot fail: `keep` is within capacity.
        let _ = payload.extend_from_slice(&data[..keep]);

        let queued = self.inbound.try_send(InboundMessage { topic, payload }).is_ok();
        if !queued {
            warn!("MQTT: inbound queue full, message dropped");
        }
        queued
    }

    fn next_message(&self) -> Option<InboundMessage> {
        self.inbound.try_receive().ok()
    }
}

fn encode(status: ConnStatus) -> u8 {
    match status {
        ConnStatus::Disconnected => 0,
        ConnStatus::Connecting => 1,
        ConnStatus::Connected => 2,
    }
}

fn decode(raw: u8) -> ConnStatus {
    match raw {
        1 => ConnStatus::Connecting,
        2 => ConnStatus::Connected,
        _ => ConnStatus::Disconnected,
    }
}

// ───────────────────────────────────────────────────────────────
// MQTT adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    session: Arc<Session>,
    #[cfg(target_os = "espidf")]
    url: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    /// Simulation: broker behaviour and traffic record.
    #[cfg(not(target_os = "espidf"))]
    refuse: bool,
    #[cfg(not(target_os = "espidf"))]
    connects: u32,
    #[cfg(not(target_os = "espidf"))]
    subscribed: std::vec::Vec<std::string::String>,
    #[cfg(not(target_os = "espidf"))]
    published: std::vec::Vec<(std::string::String, std::vec::Vec<u8>)>,
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn pump(mut conn: EspMqttConnection, session: &Session) {
    while let Ok(event) = conn.next() {
        match event.payload() {
            EventPayload::Connected(_) => {
                session.set_status(ConnStatus::Connected);
            }
            EventPayload::Disconnected => {
                session.set_status(ConnStatus::Disconnected);
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => {
                session.deliver(topic, data);
            }
            EventPayload::Error(e) => warn!("MQTT: client error {:?}", e),
            _ => {}
        }
    }
    // The client was dropped.
    session.set_status(ConnStatus::Disconnected);
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new(url: &str) -> Result<Self, BrokerError> {
        let url = heapless::String::try_from(url).map_err(|()| BrokerError::Rejected)?;
        Ok(Self {
            session: Arc::new(Session::new(ConnStatus::Disconnected)),
            url,
            client: None,
        })
    }

    fn platform_connect(&mut self, client_id: &str) -> Result<(), BrokerError> {
        self.platform_close();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            // Reconnection is paced by the broker automaton.
            disable_auto_reconnect: true,
            ..Default::default()
        };
        let (client, conn) = EspMqttClient::new(&self.url, &conf).map_err(|e| {
            warn!("MQTT: client init failed ({})", e);
            BrokerError::Rejected
        })?;

        let session = Arc::new(Session::new(ConnStatus::Connecting));
        let pumped = Arc::clone(&session);
        std::thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(6 * 1024)
            .spawn(move || pump(conn, &pumped))
            .map_err(|_| BrokerError::Rejected)?;

        self.session = session;
        self.client = Some(client);
        Ok(())
    }

    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| BrokerError::Backpressure)
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .enqueue(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|_| BrokerError::Backpressure)
    }

    fn platform_close(&mut self) {
        // Dropping the client stops it and ends the pump thread.
        self.client = None;
        self.session.set_status(ConnStatus::Disconnected);
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn new(url: &str) -> Result<Self, BrokerError> {
        if url.len() > 64 {
            return Err(BrokerError::Rejected);
        }
        Ok(Self {
            session: Arc::new(Session::new(ConnStatus::Disconnected)),
            refuse: false,
            connects: 0,
            subscribed: std::vec::Vec::new(),
            published: std::vec::Vec::new(),
        })
    }

    /// Make the broker refuse (`true`) or accept following connects.
    pub fn sim_refuse(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    /// Drop the session as a broker restart would.
    pub fn sim_drop(&mut self) {
        self.session.set_status(ConnStatus::Disconnected);
    }

    /// Deliver a message on `topic` as if the broker pushed it.
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.session.status() == ConnStatus::Connected && self.session.deliver(topic, payload)
    }

    pub fn sim_connects(&self) -> u32 {
        self.connects
    }

    pub fn sim_subscribed(&self) -> &[std::string::String] {
        &self.subscribed
    }

    pub fn sim_published(&self) -> &[(std::string::String, std::vec::Vec<u8>)] {
        &self.published
    }

    fn platform_connect(&mut self, client_id: &str) -> Result<(), BrokerError> {
        self.connects = self.connects.wrapping_add(1);
        if self.refuse {
            warn!("MQTT(sim): broker refused '{}'", client_id);
            self.session.set_status(ConnStatus::Disconnected);
            return Err(BrokerError::Rejected);
        }
        self.session = Arc::new(Session::new(ConnStatus::Connected));
        Ok(())
    }

    fn platform_subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if self.session.status() != ConnStatus::Connected {
            return Err(BrokerError::NotConnected);
        }
        self.subscribed.push(topic.into());
        Ok(())
    }

    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if self.session.status() != ConnStatus::Connected {
            return Err(BrokerError::NotConnected);
        }
        self.published.push((topic.into(), payload.to_vec()));
        Ok(())
    }

    fn platform_close(&mut self) {
        self.session.set_status(ConnStatus::Disconnected);
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerClient
// ───────────────────────────────────────────────────────────────

impl BrokerClient for MqttAdapter {
    fn session(&self) -> ConnStatus {
        self.session.status()
    }

    fn connect(&mut self, client_id: &str) -> Result<(), BrokerError> {
        self.platform_connect(client_id)?;
        info!("MQTT: session requested for '{}'", client_id);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        self.platform_subscribe(topic)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.platform_publish(topic, payload)
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.session.next_message()
    }

    fn close(&mut self) {
        self.platform_close();
        info!("MQTT: session closed");
    }
}
