//! Application service: the hexagonal core.
//!
//! [`NodeService`] is the single owned context for the node: sample
//! timer, motor cycle, power integrator and both connectivity automata.
//! All I/O flows through port traits injected at call sites, making the
//! entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//! ActuatorPort ◀──│         NodeService           │
//! IndicatorPort ◀─│ timer · motor · power         │
//!   LinkDriver ◀─▶│ link · broker                 │◀─▶ BrokerClient
//!                 └──────────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::config::NodeConfig;
use crate::error::FaultKind;
use crate::motor::MotorCycle;
use crate::net::broker::{BrokerAutomaton, BrokerTransition};
use crate::net::link::{FailureClass, LinkAutomaton, LinkEventHandle, LinkTransition};
use crate::power::PowerIntegrator;
use crate::scheduler::SampleTimer;
use crate::telemetry::TelemetrySnapshot;

use super::commands::{CommandReply, NodeCommand};
use super::events::AppEvent;
use super::ports::{
    ActuatorPort, BrokerClient, EventSink, INBOUND_PAYLOAD_LEN, IndicatorPort, InboundMessage,
    LinkDriver, SensorPort,
};

const STATUS_ONLINE: &[u8] = b"online";
const UPDATE_READY: &[u8] = b"ready";
const UPDATE_IN_PROGRESS: &[u8] = b"updating";

/// Status LED colour for a sample countdown: green right after a sample,
/// fading linearly to red as the next one comes due.
pub fn countdown_colour(progress: f32) -> (u8, u8, u8) {
    let p = progress.clamp(0.0, 1.0);
    let red = (p * 255.0) as u8;
    let green = ((1.0 - p) * 255.0) as u8;
    (red, green, 0)
}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    config: NodeConfig,
    timer: SampleTimer,
    motor: MotorCycle,
    power: PowerIntegrator,
    link: LinkAutomaton,
    broker: BrokerAutomaton,
    /// Monotonic uptime built from wrapping `u32` deltas.
    uptime_ms: u64,
    last_tick_at_ms: u32,
    /// Latest non-update payload, echoed on the next sample tick.
    pending_payload: Option<heapless::Vec<u8, INBOUND_PAYLOAD_LEN>>,
    last_snapshot: Option<TelemetrySnapshot>,
    sample_count: u64,
    reboot_requested: bool,
}

impl NodeService {
    /// Construct the service.  Peripheral health is latched from the
    /// adapters' boot-time initialisation and never re-checked.
    pub fn new(config: NodeConfig, now_ms: u32, hw: &(impl SensorPort + ActuatorPort)) -> Self {
        let timer = SampleTimer::new(config.sample_interval_ms, now_ms);
        let motor = MotorCycle::new(&config, hw.available());
        let power = PowerIntegrator::new(
            config.current_calibration,
            config.resistance_sentinel,
            hw.initialized(),
            now_ms,
        );
        let link = LinkAutomaton::new(&config);
        let broker = BrokerAutomaton::new(&config);
        Self {
            config,
            timer,
            motor,
            power,
            link,
            broker,
            uptime_ms: 0,
            last_tick_at_ms: now_ms,
            pending_payload: None,
            last_snapshot: None,
            sample_count: 0,
            reboot_requested: false,
        }
    }

    /// Producer handle the WiFi adapter posts driver events through.
    pub fn link_event_handle(&self) -> LinkEventHandle {
        self.link.event_handle()
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the motor cycle and the initial WiFi association.
    pub fn start(
        &mut self,
        now_ms: u32,
        hw: &mut impl ActuatorPort,
        wifi: &mut impl LinkDriver,
        sink: &mut impl EventSink,
    ) {
        self.motor.start(hw);
        sink.emit(&AppEvent::Started {
            sensor_healthy: !self.power.is_degraded(),
            motor_available: !self.motor.is_degraded(),
        });

        if self.power.is_degraded() {
            error!("Power sensor init failed, telemetry will report it down");
            sink.emit(&AppEvent::Fault(FaultKind::SensorInitFailure));
        }
        if self.motor.is_degraded() {
            error!("Motor driver init failed, duty cycle disabled");
            sink.emit(&AppEvent::Fault(FaultKind::ActuatorUnavailable));
        }

        if let Err(e) = self.link.begin(now_ms, wifi) {
            warn!("Initial association failed: {}", e);
        }
        info!(
            "NodeService started (interval {} ms, reverse ratio {})",
            self.config.sample_interval_ms, self.config.reverse_ratio
        );
    }

    // ── Per-call orchestration ────────────────────────────────

    /// One scheduler invocation.  Never blocks.  Returns `true` if a
    /// sample tick ran.
    pub fn tick(
        &mut self,
        now_ms: u32,
        hw: &mut (impl SensorPort + ActuatorPort + IndicatorPort),
        wifi: &mut impl LinkDriver,
        mqtt: &mut impl BrokerClient,
        sink: &mut impl EventSink,
    ) -> bool {
        self.uptime_ms += u64::from(now_ms.wrapping_sub(self.last_tick_at_ms));
        self.last_tick_at_ms = now_ms;

        // 1. Connectivity
        self.link.advance(now_ms, wifi, |t| {
            if let LinkTransition::Down { class, will_retry: true, .. } = t {
                let fault = match class {
                    FailureClass::Auth => Some(FaultKind::NetworkAuthFailure),
                    FailureClass::Transient => Some(FaultKind::NetworkTransientFailure),
                    // Boot window: not a classified failure.
                    FailureClass::None => None,
                };
                if let Some(fault) = fault {
                    sink.emit(&AppEvent::Fault(fault));
                }
            }
            sink.emit(&AppEvent::LinkChanged(t));
        });

        let mut came_up = false;
        self.broker.advance(now_ms, self.link.status(), mqtt, |t| {
            match t {
                BrokerTransition::Up => came_up = true,
                BrokerTransition::Rejected => {
                    sink.emit(&AppEvent::Fault(FaultKind::BrokerConnectFailure));
                }
                BrokerTransition::Down | BrokerTransition::LinkLost => {}
            }
            sink.emit(&AppEvent::BrokerChanged(t));
        });
        if came_up {
            self.announce(mqtt);
        }

        while let Some(msg) = self.broker.poll_inbound(mqtt) {
            self.route_inbound(msg, mqtt, sink);
        }

        // 2. Actuator ramp and countdown indicator
        self.motor.advance_ramp(hw);
        let (r, g, b) = countdown_colour(self.timer.progress(now_ms));
        hw.set_led(r, g, b);

        // 3. Sample tick
        if !self.timer.poll(now_ms) {
            return false;
        }
        self.sample(now_ms, hw, &*wifi, mqtt, sink);
        true
    }

    fn sample(
        &mut self,
        now_ms: u32,
        hw: &mut (impl SensorPort + ActuatorPort),
        wifi: &impl LinkDriver,
        mqtt: &mut impl BrokerClient,
        sink: &mut impl EventSink,
    ) {
        self.sample_count += 1;

        self.motor.on_sample_tick(hw);

        let was_guarded = self.power.resistance_guarded();
        self.power.sample(now_ms, hw);
        if self.power.resistance_guarded() && !was_guarded {
            sink.emit(&AppEvent::Fault(FaultKind::DivideByZeroGuard));
        }

        let rssi = if self.link.status().is_connected() {
            wifi.rssi()
        } else {
            None
        };
        let snapshot = self.build_telemetry(rssi);
        self.last_snapshot = Some(snapshot);
        sink.emit(&AppEvent::Telemetry(snapshot));

        match snapshot.to_json() {
            Ok(json) => {
                self.broker.publish(mqtt, &self.config.sensor_topic, &json);
            }
            Err(e) => error!("Telemetry encode failed: {}", e),
        }

        if let Some(payload) = self.pending_payload.take() {
            info!("processed payload: {}", String::from_utf8_lossy(&payload));
        }
    }

    // ── Broker side ───────────────────────────────────────────

    fn announce(&mut self, mqtt: &mut impl BrokerClient) {
        self.broker.publish(mqtt, &self.config.status_topic, STATUS_ONLINE);
        self.broker.publish(mqtt, &self.config.update_state_topic, UPDATE_READY);
    }

    fn route_inbound(
        &mut self,
        msg: InboundMessage,
        mqtt: &mut impl BrokerClient,
        sink: &mut impl EventSink,
    ) {
        info!(
            "received topic: {} / payload: {}",
            msg.topic,
            String::from_utf8_lossy(&msg.payload)
        );
        if msg.is_update_request() {
            info!("Firmware update requested via MQTT");
            let topic = &self.config.update_state_topic;
            self.broker.publish(mqtt, topic, UPDATE_IN_PROGRESS);
            sink.emit(&AppEvent::UpdateRequested);
            self.broker.publish(mqtt, topic, UPDATE_READY);
        } else {
            self.pending_payload = Some(msg.payload);
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an operator command.  Takes effect immediately.
    pub fn handle_command(
        &mut self,
        cmd: NodeCommand,
        now_ms: u32,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> CommandReply {
        let done = |ok: bool| if ok { CommandReply::Accepted } else { CommandReply::Ignored };
        match cmd {
            NodeCommand::Force => {
                info!("Forcing sample");
                done(self.timer.force(now_ms))
            }
            NodeCommand::Speed(speed) => done(self.motor.set_speed(speed, hw)),
            NodeCommand::Forward => done(self.motor.forward(hw)),
            NodeCommand::Reverse => done(self.motor.reverse(hw)),
            NodeCommand::Stop => done(self.motor.stop(hw)),
            NodeCommand::Power => {
                self.power.sample(now_ms, hw);
                CommandReply::Power(*self.power.latest())
            }
            NodeCommand::Reboot => {
                warn!("Reboot requested");
                self.reboot_requested = true;
                sink.emit(&AppEvent::RebootRequested);
                CommandReply::Accepted
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn build_telemetry(&self, wifi_rssi: Option<i8>) -> TelemetrySnapshot {
        TelemetrySnapshot::capture(
            self.motor.state(),
            self.power.latest(),
            wifi_rssi,
            self.uptime_ms / 1000,
        )
    }

    /// Inbound payload waiting to be echoed on the next sample tick.
    pub fn pending_payload(&self) -> Option<&[u8]> {
        self.pending_payload.as_deref()
    }

    pub fn last_snapshot(&self) -> Option<&TelemetrySnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn motor(&self) -> &MotorCycle {
        &self.motor
    }

    pub fn power(&self) -> &PowerIntegrator {
        &self.power
    }

    pub fn link(&self) -> &LinkAutomaton {
        &self.link
    }

    pub fn broker(&self) -> &BrokerAutomaton {
        &self.broker
    }

    pub fn timer(&self) -> &SampleTimer {
        &self.timer
    }

    /// Sample ticks executed since startup.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn uptime_secs(&self) -> u64 {
        self.uptime_ms / 1000
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_runs_green_to_red() {
        assert_eq!(countdown_colour(0.0), (0, 255, 0));
        assert_eq!(countdown_colour(1.0), (255, 0, 0));
        assert_eq!(countdown_colour(7.5), (255, 0, 0));
        let (r, g, _) = countdown_colour(0.5);
        assert!(r >= 127 && g >= 127);
    }
}
