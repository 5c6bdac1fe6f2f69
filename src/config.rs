//! Node configuration parameters
//!
//! All tunable parameters for the FilterChlorine node.
//! Defaults reproduce the deployed firmware; a JSON overlay (from the
//! provisioning side) can override any subset via [`NodeConfig::from_json`].

use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum length of any MQTT topic the node publishes or subscribes to.
pub const TOPIC_LEN: usize = 48;
/// Maximum number of subscribed topics.
pub const MAX_SUBSCRIPTIONS: usize = 4;

pub type Topic = String<TOPIC_LEN>;

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    // --- Scheduling ---
    /// Sample tick interval (milliseconds).
    pub sample_interval_ms: u32,

    // --- Motor ---
    /// Fraction of sample ticks spent in reverse, in (0, 1].
    /// The forward phase lasts roughly `1 / reverse_ratio` ticks.
    pub reverse_ratio: f32,
    /// Speed used by the anti-fouling cycle (PWM counts).
    pub motor_speed: u16,
    /// Full-scale PWM count for the motor driver (8-bit → 255).
    pub motor_max_speed: u16,
    /// Speed increment applied per scheduler call when changing direction.
    /// 0 switches directly to the target speed.
    pub motor_ramp_step: u16,

    // --- Power sensor ---
    /// Empirical multiplier applied to the raw INA219 current reading.
    pub current_calibration: f32,
    /// Value reported for resistance when current is too small to divide by.
    pub resistance_sentinel: f32,

    // --- Link (WiFi) ---
    /// Retry delay after a transient disconnect (milliseconds).
    pub link_short_backoff_ms: u32,
    /// Retry delay after an auth/handshake/timeout disconnect (milliseconds).
    pub link_long_backoff_ms: u32,

    // --- Broker (MQTT) ---
    /// Retry delay between broker connect attempts (milliseconds).
    pub broker_retry_ms: u32,
    /// Broker endpoint, `mqtt://host:port`.
    pub broker_url: String<64>,
    /// Client identifier presented to the broker.
    pub client_id: String<24>,
    /// Telemetry topic.
    pub sensor_topic: Topic,
    /// Availability topic (`online` on connect).
    pub status_topic: Topic,
    /// Firmware-update handshake topic.
    pub update_state_topic: Topic,
    /// Topics re-subscribed on every broker connect.
    pub subscriptions: Vec<Topic, MAX_SUBSCRIPTIONS>,
}

fn topic(s: &str) -> Topic {
    let mut t = Topic::new();
    // Defaults are compile-time literals well under TOPIC_LEN.
    let _ = t.push_str(s);
    t
}

impl Default for NodeConfig {
    fn default() -> Self {
        let mut subscriptions = Vec::new();
        let _ = subscriptions.push(topic("beacon"));
        let mut client_id = String::new();
        let _ = client_id.push_str("temp_device_id");
        let mut broker_url = String::new();
        let _ = broker_url.push_str("mqtt://192.168.1.10:1883");

        Self {
            // Scheduling
            sample_interval_ms: 60_000, // 1/min

            // Motor
            reverse_ratio: 0.1, // 1 reverse tick in every 10
            motor_speed: 255,
            motor_max_speed: 255,
            motor_ramp_step: 0,

            // Power sensor
            current_calibration: 18.15,
            resistance_sentinel: -1.0,

            // Link
            link_short_backoff_ms: 10_000,
            link_long_backoff_ms: 30_000,

            // Broker
            broker_retry_ms: 3_000,
            broker_url,
            client_id,
            sensor_topic: topic("filterchlorine/sensors"),
            status_topic: topic("filterchlorine/status"),
            update_state_topic: topic("filterchlorine/ota/state"),
            subscriptions,
        }
    }
}

impl NodeConfig {
    /// Overlay a JSON document on the defaults and validate the result.
    /// Fields absent from the document keep their default value.
    pub fn from_json(json: &[u8]) -> Result<Self> {
        let config: Self =
            serde_json::from_slice(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(Error::Config("sample_interval_ms must be > 0"));
        }
        // Intervals beyond half the u32 range break wraparound-safe comparisons.
        if self.sample_interval_ms > i32::MAX as u32
            || self.link_long_backoff_ms > i32::MAX as u32
            || self.broker_retry_ms > i32::MAX as u32
        {
            return Err(Error::Config("interval exceeds half the millisecond clock range"));
        }
        if !(self.reverse_ratio > 0.0 && self.reverse_ratio <= 1.0) {
            return Err(Error::Config("reverse_ratio must be in (0, 1]"));
        }
        if self.motor_max_speed == 0 || self.motor_speed > self.motor_max_speed {
            return Err(Error::Config("motor_speed must be within 0..=motor_max_speed"));
        }
        if !self.current_calibration.is_finite() || self.current_calibration <= 0.0 {
            return Err(Error::Config("current_calibration must be finite and > 0"));
        }
        if !self.resistance_sentinel.is_finite() {
            return Err(Error::Config("resistance_sentinel must be finite"));
        }
        if self.link_short_backoff_ms > self.link_long_backoff_ms {
            return Err(Error::Config("short backoff must not exceed long backoff"));
        }
        if self.sensor_topic.is_empty() || self.client_id.is_empty() {
            return Err(Error::Config("sensor_topic and client_id must be set"));
        }
        if !self.broker_url.starts_with("mqtt://") && !self.broker_url.starts_with("mqtts://") {
            return Err(Error::Config("broker_url must be an mqtt:// or mqtts:// URL"));
        }
        Ok(())
    }
}
