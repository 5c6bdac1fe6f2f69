//! End-to-end tests for the NodeService → motor / power / broker pipeline.
//!
//! Drive the service tick by tick against mock hardware and the host
//! simulations of the WiFi and MQTT adapters.

use crate::mock_hw::{ActuatorCall, MockHardware, Rig};

use filterchlorine::app::commands::{CommandReply, NodeCommand};
use filterchlorine::app::events::AppEvent;
use filterchlorine::config::NodeConfig;
use filterchlorine::error::FaultKind;
use filterchlorine::motor::Direction;
use filterchlorine::net::ConnStatus;
use filterchlorine::net::broker::BrokerTransition;
use filterchlorine::net::link::LinkTransition;
use serde_json::Value;

const MINUTE: u32 = 60_000;
const SENSOR_TOPIC: &str = "filterchlorine/sensors";
const STATUS_TOPIC: &str = "filterchlorine/status";
const UPDATE_TOPIC: &str = "filterchlorine/ota/state";

fn online_rig() -> Rig {
    let mut rig = Rig::new(MockHardware::new());
    rig.start(0);
    rig.tick(0);
    rig
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_brings_up_link_then_broker_and_announces() {
    let rig = online_rig();

    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
    assert!(rig.sink.contains(&AppEvent::LinkChanged(LinkTransition::Up)));
    assert!(rig.sink.contains(&AppEvent::BrokerChanged(BrokerTransition::Up)));
    assert!(rig.sink.contains(&AppEvent::Started {
        sensor_healthy: true,
        motor_available: true,
    }));

    assert_eq!(rig.mqtt.sim_subscribed(), ["beacon"]);
    assert_eq!(rig.published_on(STATUS_TOPIC), [b"online".to_vec()]);
    assert_eq!(rig.published_on(UPDATE_TOPIC), [b"ready".to_vec()]);
}

#[test]
fn boot_starts_motor_forward_at_cycle_speed() {
    let rig = online_rig();
    assert_eq!(rig.hw.drives().first(), Some(&(Direction::Forward, 255)));
}

// ── Sampling and publishing ───────────────────────────────────

#[test]
fn first_sample_is_published_as_dashboard_json() {
    let rig = online_rig();

    assert_eq!(rig.app.sample_count(), 1);
    let published = rig.published_on(SENSOR_TOPIC);
    assert_eq!(published.len(), 1);

    let v: Value = serde_json::from_slice(&published[0]).unwrap();
    assert_eq!(v["direction"], "forward");
    assert_eq!(v["down"], "online");
    assert_eq!(v["motordown"], "online");
    assert_eq!(v["rssi"], -60);
    assert_eq!(v["reversecount"], 0);
    let current = v["current"].as_f64().unwrap();
    assert!((current - 181.5).abs() < 1e-3, "10 mA raw x 18.15, got {current}");
}

#[test]
fn samples_follow_the_interval() {
    let mut rig = online_rig();
    assert!(!rig.tick(MINUTE - 1));
    assert!(rig.tick(MINUTE));
    assert!(!rig.tick(MINUTE + 10));
    assert!(rig.tick(2 * MINUTE + 5));
    assert_eq!(rig.app.sample_count(), 3);
    assert_eq!(rig.published_on(SENSOR_TOPIC).len(), 3);
}

#[test]
fn telemetry_is_dropped_not_queued_while_offline() {
    let mut rig = Rig::new(MockHardware::new());
    // Never started: the link stays down.
    assert!(rig.tick(0));
    assert!(rig.tick(MINUTE));

    assert_eq!(rig.sink.snapshots().len(), 2);
    assert!(rig.mqtt.sim_published().is_empty());
    assert_eq!(rig.app.broker().dropped_count(), 2);
    assert_eq!(rig.mqtt.sim_connects(), 0);
    assert!(rig.sink.snapshots().iter().all(|s| s.rssi.is_none()));
}

#[test]
fn charge_accumulates_across_samples() {
    let mut rig = online_rig();
    rig.tick(MINUTE);
    rig.tick(2 * MINUTE);
    // 181.5 mA for two minutes.
    let mah = rig.app.power().latest().accumulated_milliamp_hours;
    assert!((mah - 181.5 * 120.0 / 3600.0).abs() < 1e-3, "got {mah}");
}

// ── Duty cycle ────────────────────────────────────────────────

#[test]
fn duty_cycle_reverses_for_exactly_one_sample() {
    let mut rig = online_rig();
    // Sample 1 ran at t=0; samples 2..=10 follow.
    for n in 1..10 {
        rig.tick(n * MINUTE);
    }
    assert_eq!(rig.app.motor().state().direction, Direction::Reverse);
    assert_eq!(rig.app.motor().state().reverse_count, 1);

    rig.tick(10 * MINUTE);
    assert_eq!(rig.app.motor().state().direction, Direction::Forward);
    assert!(rig.hw.drives().contains(&(Direction::Reverse, 255)));

    let last = rig.app.last_snapshot().unwrap();
    assert_eq!(last.reversecount, 1);
    assert_eq!(last.direction, Direction::Forward);
}

#[test]
fn ramp_advances_once_per_scheduler_call() {
    let config = NodeConfig {
        motor_ramp_step: 100,
        ..NodeConfig::default()
    };
    let mut rig = Rig::with_config(config, MockHardware::new());
    rig.start(0);
    assert_eq!(rig.hw.drives(), [(Direction::Forward, 100)]);
    rig.tick(1);
    rig.tick(2);
    rig.tick(3);
    assert_eq!(
        rig.hw.drives(),
        [
            (Direction::Forward, 100),
            (Direction::Forward, 200),
            (Direction::Forward, 255),
        ]
    );
}

// ── Indicator ─────────────────────────────────────────────────

#[test]
fn led_fades_from_green_to_red_over_the_interval() {
    let mut rig = online_rig();
    rig.tick(1);
    assert_eq!(rig.hw.last_led(), Some((0, 254, 0)));
    rig.tick(MINUTE / 2);
    let (r, g, b) = rig.hw.last_led().unwrap();
    assert!(r >= 126 && g >= 126 && b == 0, "got {r},{g},{b}");
    rig.tick(MINUTE - 1);
    let (r, g, _) = rig.hw.last_led().unwrap();
    assert!(r > 250 && g < 5);
}

// ── Inbound messages ──────────────────────────────────────────

#[test]
fn update_request_runs_the_handshake() {
    let mut rig = online_rig();
    assert!(rig.mqtt.sim_inject("beacon", b"OTA_UPDATE"));
    rig.tick(10);

    assert!(rig.sink.contains(&AppEvent::UpdateRequested));
    assert_eq!(
        rig.published_on(UPDATE_TOPIC),
        [b"ready".to_vec(), b"updating".to_vec(), b"ready".to_vec()]
    );
    assert_eq!(rig.app.pending_payload(), None);
}

#[test]
fn other_payload_is_held_until_the_next_sample() {
    let mut rig = online_rig();
    assert!(rig.mqtt.sim_inject("beacon", b"hello"));
    rig.tick(10);
    assert_eq!(rig.app.pending_payload(), Some(&b"hello"[..]));
    assert!(!rig.sink.contains(&AppEvent::UpdateRequested));

    rig.tick(MINUTE);
    assert_eq!(rig.app.pending_payload(), None);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn force_is_idempotent_within_a_tick() {
    let mut rig = online_rig();
    let Rig { app, hw, sink, .. } = &mut rig;
    assert_eq!(app.handle_command(NodeCommand::Force, 500, hw, sink), CommandReply::Accepted);
    assert_eq!(app.handle_command(NodeCommand::Force, 500, hw, sink), CommandReply::Ignored);
    assert_eq!(app.timer().next_due_at_ms(), 500);

    assert!(rig.tick(501));
    assert!(!rig.tick(502));
    assert_eq!(rig.app.sample_count(), 2);
}

#[test]
fn motor_overrides_act_immediately() {
    let mut rig = online_rig();
    let Rig { app, hw, sink, .. } = &mut rig;

    app.handle_command(NodeCommand::Reverse, 5, hw, sink);
    assert_eq!(hw.drives().last(), Some(&(Direction::Reverse, 255)));

    app.handle_command(NodeCommand::Speed(120), 6, hw, sink);
    assert_eq!(hw.drives().last(), Some(&(Direction::Reverse, 120)));

    app.handle_command(NodeCommand::Stop, 7, hw, sink);
    let last_motor_call = hw
        .calls
        .iter()
        .rev()
        .find(|c| !matches!(c, ActuatorCall::SetLed { .. }));
    assert_eq!(last_motor_call, Some(&ActuatorCall::Stop));
    assert_eq!(app.motor().state().speed, 0);

    // A stopped motor restarts forward.
    app.handle_command(NodeCommand::Speed(80), 8, hw, sink);
    assert_eq!(hw.drives().last(), Some(&(Direction::Forward, 80)));
}

#[test]
fn power_command_reads_outside_the_schedule() {
    let mut rig = online_rig();
    let reads_before = rig.hw.reads;
    let Rig { app, hw, sink, .. } = &mut rig;
    let reply = app.handle_command(NodeCommand::Power, 5_000, hw, sink);

    let CommandReply::Power(p) = reply else {
        panic!("expected a power reading, got {reply:?}");
    };
    assert!((p.current_milliamps - 181.5).abs() < 1e-3);
    assert!((p.load_volts - 12.002).abs() < 1e-4);
    assert_eq!(rig.hw.reads, reads_before + 1);
    assert_eq!(rig.app.sample_count(), 1);
}

#[test]
fn reboot_command_sets_the_halt_request() {
    let mut rig = online_rig();
    assert!(!rig.app.reboot_requested());
    let Rig { app, hw, sink, .. } = &mut rig;
    app.handle_command(NodeCommand::Reboot, 5, hw, sink);
    assert!(rig.app.reboot_requested());
    assert!(rig.sink.contains(&AppEvent::RebootRequested));
}

// ── Degraded modes ────────────────────────────────────────────

#[test]
fn dead_sensor_freezes_power_fields_for_a_thousand_samples() {
    let mut rig = Rig::new(MockHardware::with_dead_sensor());
    rig.start(0);

    for n in 0..1000 {
        assert!(rig.tick(n * MINUTE));
    }

    let snaps = rig.sink.snapshots();
    assert_eq!(snaps.len(), 1000);
    assert!(snaps.iter().all(|s| s.down));
    assert!(snaps.iter().all(|s| s.current == 0.0 && s.resistance == 0.0));
    assert!(snaps.iter().all(|s| s.milliamp_hours == 0.0));
    assert_eq!(rig.hw.reads, 0);
    assert_eq!(rig.sink.faults(FaultKind::SensorInitFailure), 1);

    // The motor kept cycling regardless: one reversal every 11 samples,
    // the first on sample 10.
    assert_eq!(rig.app.motor().state().reverse_count, 91);

    let last: Value = serde_json::from_slice(rig.published_on(SENSOR_TOPIC).last().unwrap()).unwrap();
    assert_eq!(last["down"], "offline");
}

#[test]
fn dead_motor_is_never_driven() {
    let mut rig = Rig::new(MockHardware::with_dead_motor());
    rig.start(0);
    for n in 0..25 {
        rig.tick(n * MINUTE);
    }

    assert!(rig.hw.drives().is_empty());
    assert_eq!(rig.sink.faults(FaultKind::ActuatorUnavailable), 1);
    assert_eq!(rig.app.motor().state().reverse_count, 0);
    assert!(rig.app.last_snapshot().unwrap().motor_down);

    let Rig { app, hw, sink, .. } = &mut rig;
    assert_eq!(
        app.handle_command(NodeCommand::Forward, 0, hw, sink),
        CommandReply::Ignored
    );
    // Telemetry still flows.
    assert_eq!(rig.published_on(SENSOR_TOPIC).len(), 25);
}

#[test]
fn zero_current_reports_the_resistance_sentinel_once() {
    let mut hw = MockHardware::new();
    hw.reading.current_milliamps = 0.0;
    let mut rig = Rig::new(hw);
    rig.start(0);
    rig.tick(0);
    rig.tick(MINUTE);

    let last = rig.app.last_snapshot().unwrap();
    assert_eq!(last.resistance, -1.0);
    assert!(!last.resistance.is_nan());
    assert_eq!(rig.sink.faults(FaultKind::DivideByZeroGuard), 1);
}
