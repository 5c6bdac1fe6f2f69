//! Telemetry snapshot published once per sample tick.
//!
//! Field names are the wire format consumed by the dashboard and must
//! not change.

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::motor::{Direction, MotorState};
use crate::power::PowerSample;

/// Upper bound on an encoded snapshot.
pub const MAX_PAYLOAD_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub resistance: f32,
    pub current: f32,
    /// `null` while the link is down.
    pub rssi: Option<i8>,
    pub direction: Direction,
    /// Seconds since boot.
    pub uptime: u64,
    /// Power sensor failed at boot; every power field is frozen.
    #[serde(serialize_with = "offline_online")]
    pub down: bool,
    /// Motor driver failed at boot; the duty cycle is not running.
    #[serde(rename = "motordown", serialize_with = "offline_online")]
    pub motor_down: bool,
    pub busvoltage: f32,
    pub shuntvoltage: f32,
    pub loadvoltage: f32,
    #[serde(rename = "power_mW")]
    pub power_mw: f32,
    #[serde(rename = "mAh")]
    pub milliamp_hours: f32,
    pub reversecount: u32,
}

fn offline_online<S: Serializer>(down: &bool, s: S) -> core::result::Result<S::Ok, S::Error> {
    s.serialize_str(if *down { "offline" } else { "online" })
}

impl TelemetrySnapshot {
    pub fn capture(
        motor: &MotorState,
        power: &PowerSample,
        rssi: Option<i8>,
        uptime_secs: u64,
    ) -> Self {
        Self {
            resistance: power.resistance_ohms,
            current: power.current_milliamps,
            rssi,
            direction: motor.direction,
            uptime: uptime_secs,
            down: !power.sensor_healthy,
            motor_down: !motor.available,
            busvoltage: power.bus_volts,
            shuntvoltage: power.shunt_millivolts,
            loadvoltage: power.load_volts,
            power_mw: power.power_milliwatts,
            milliamp_hours: power.accumulated_milliamp_hours,
            reversecount: motor.reverse_count,
        }
    }

    /// Encode as a JSON object.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let buf = serde_json::to_vec(self).map_err(|_| Error::Encode)?;
        if buf.len() > MAX_PAYLOAD_LEN {
            return Err(Error::Encode);
        }
        Ok(buf)
    }
}
