//! Mock hardware and event sink for integration tests.
//!
//! Records every actuator and LED call so tests can assert on the full
//! command history without touching real GPIO/PWM registers.

use filterchlorine::adapters::mqtt::MqttAdapter;
use filterchlorine::adapters::wifi::WifiAdapter;
use filterchlorine::app::events::AppEvent;
use filterchlorine::app::ports::{
    ActuatorPort, EventSink, IndicatorPort, RawPowerReading, SensorPort,
};
use filterchlorine::app::service::NodeService;
use filterchlorine::config::NodeConfig;
use filterchlorine::error::{FaultKind, SensorError};
use filterchlorine::motor::Direction;
use filterchlorine::telemetry::TelemetrySnapshot;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCall {
    Drive { direction: Direction, speed: u16 },
    Stop,
    SetLed { r: u8, g: u8, b: u8 },
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    pub sensor_ok: bool,
    pub motor_ok: bool,
    pub reading: RawPowerReading,
    pub reads: u32,
    direction: Direction,
    speed: u16,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            sensor_ok: true,
            motor_ok: true,
            reading: RawPowerReading {
                shunt_millivolts: 2.0,
                bus_volts: 12.0,
                current_milliamps: 10.0,
            },
            reads: 0,
            direction: Direction::Forward,
            speed: 0,
        }
    }

    pub fn with_dead_sensor() -> Self {
        Self {
            sensor_ok: false,
            ..Self::new()
        }
    }

    pub fn with_dead_motor() -> Self {
        Self {
            motor_ok: false,
            ..Self::new()
        }
    }

    pub fn drives(&self) -> Vec<(Direction, u16)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCall::Drive { direction, speed } => Some((*direction, *speed)),
                _ => None,
            })
            .collect()
    }

    pub fn last_led(&self) -> Option<(u8, u8, u8)> {
        self.calls.iter().rev().find_map(|c| match c {
            ActuatorCall::SetLed { r, g, b } => Some((*r, *g, *b)),
            _ => None,
        })
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn initialized(&self) -> bool {
        self.sensor_ok
    }

    fn read_raw(&mut self) -> Result<RawPowerReading, SensorError> {
        if !self.sensor_ok {
            return Err(SensorError::NotInitialized);
        }
        self.reads += 1;
        Ok(self.reading)
    }
}

impl ActuatorPort for MockHardware {
    fn available(&self) -> bool {
        self.motor_ok
    }

    fn drive(&mut self, direction: Direction, speed: u16) {
        self.direction = direction;
        self.speed = speed;
        self.calls.push(ActuatorCall::Drive { direction, speed });
    }

    fn stop(&mut self) {
        self.speed = 0;
        self.calls.push(ActuatorCall::Stop);
    }

    fn is_forward(&self) -> bool {
        self.direction == Direction::Forward
    }

    fn current_speed(&self) -> u16 {
        self.speed
    }
}

impl IndicatorPort for MockHardware {
    fn set_led(&mut self, r: u8, g: u8, b: u8) {
        self.calls.push(ActuatorCall::SetLed { r, g, b });
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self, kind: FaultKind) -> usize {
        self.events
            .iter()
            .filter(|e| **e == AppEvent::Fault(kind))
            .count()
    }

    pub fn snapshots(&self) -> Vec<TelemetrySnapshot> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Telemetry(t) => Some(*t),
                _ => None,
            })
            .collect()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Node rig ──────────────────────────────────────────────────

/// A service wired to mock hardware and the simulated network adapters.
pub struct Rig {
    pub app: NodeService,
    pub hw: MockHardware,
    pub wifi: WifiAdapter,
    pub mqtt: MqttAdapter,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new(hw: MockHardware) -> Self {
        Self::with_config(NodeConfig::default(), hw)
    }

    pub fn with_config(config: NodeConfig, hw: MockHardware) -> Self {
        let app = NodeService::new(config, 0, &hw);
        let wifi = WifiAdapter::new("HomeWiFi", "mysecret8", app.link_event_handle())
            .expect("valid credentials");
        let mqtt = MqttAdapter::new("mqtt://192.168.1.10:1883").expect("valid url");
        Self {
            app,
            hw,
            wifi,
            mqtt,
            sink: RecordingSink::new(),
        }
    }

    /// Start the node; the simulated radio associates immediately.
    pub fn start(&mut self, now_ms: u32) {
        self.app
            .start(now_ms, &mut self.hw, &mut self.wifi, &mut self.sink);
    }

    pub fn tick(&mut self, now_ms: u32) -> bool {
        self.app.tick(
            now_ms,
            &mut self.hw,
            &mut self.wifi,
            &mut self.mqtt,
            &mut self.sink,
        )
    }

    /// Payloads published on `topic`, oldest first.
    pub fn published_on(&self, topic: &str) -> Vec<Vec<u8>> {
        self.mqtt
            .sim_published()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.clone())
            .collect()
    }
}
