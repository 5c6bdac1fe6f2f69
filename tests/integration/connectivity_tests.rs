//! Link and broker recovery as seen through NodeService.

use crate::mock_hw::{MockHardware, Rig};

use filterchlorine::app::events::AppEvent;
use filterchlorine::error::FaultKind;
use filterchlorine::net::ConnStatus;
use filterchlorine::net::broker::BrokerTransition;
use filterchlorine::net::link::{FailureClass, LinkTransition, REASON_AUTH_FAIL};

/// Beacon timeout: transient.
const REASON_BEACON_TIMEOUT: u8 = 200;
/// No access point found: transient.
const REASON_NO_AP_FOUND: u8 = 201;

const HOUR: u32 = 3_600_000;

fn connected_rig() -> Rig {
    let mut rig = Rig::new(MockHardware::new());
    rig.start(0);
    rig.tick(0);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    rig
}

#[test]
fn first_drop_after_boot_is_retried_after_short_backoff() {
    let mut rig = connected_rig();
    let attempts = rig.wifi.sim_attempts();

    rig.wifi.sim_drop(REASON_BEACON_TIMEOUT);
    rig.tick(HOUR);
    assert!(rig.sink.contains(&AppEvent::LinkChanged(LinkTransition::Down {
        reason: REASON_BEACON_TIMEOUT,
        class: FailureClass::Transient,
        will_retry: true,
    })));
    assert!(rig.sink.contains(&AppEvent::BrokerChanged(BrokerTransition::LinkLost)));

    rig.tick(HOUR + 9_999);
    assert_eq!(rig.wifi.sim_attempts(), attempts);
    rig.tick(HOUR + 10_000);
    assert_eq!(rig.wifi.sim_attempts(), attempts + 1);
    rig.tick(HOUR + 10_001);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
}

#[test]
fn missing_access_point_at_boot_is_retried_until_it_appears() {
    let mut rig = Rig::new(MockHardware::new());
    rig.wifi.sim_fail_with(Some(REASON_NO_AP_FOUND));
    rig.start(0);
    rig.tick(0);
    assert!(rig.sink.contains(&AppEvent::LinkChanged(LinkTransition::Down {
        reason: REASON_NO_AP_FOUND,
        class: FailureClass::None,
        will_retry: true,
    })));
    assert_eq!(rig.app.link().state().backoff_until_ms, 10_000);

    // Attempts at 10 s, 21 s, 32 s, 43 s and 54 s; each failure is seen a
    // tick later and backs off another 10 s.
    let mut now = 0;
    while now < 60_000 {
        now += 1_000;
        rig.tick(now);
    }
    assert_eq!(rig.wifi.sim_attempts(), 6);
    assert_eq!(rig.app.link().status(), ConnStatus::Disconnected);
    assert_eq!(rig.sink.faults(FaultKind::NetworkTransientFailure), 5);

    rig.wifi.sim_fail_with(None);
    for _ in 0..12 {
        now += 1_000;
        rig.tick(now);
    }
    assert_eq!(rig.wifi.sim_attempts(), 7);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
}

#[test]
fn transient_drop_reconnects_after_short_backoff_and_broker_follows() {
    let mut rig = connected_rig();
    let connects = rig.mqtt.sim_connects();

    rig.wifi.sim_drop(REASON_BEACON_TIMEOUT);
    rig.tick(1_000);
    assert_eq!(rig.sink.faults(FaultKind::NetworkTransientFailure), 1);
    assert_eq!(rig.app.link().state().backoff_until_ms, 11_000);

    rig.tick(10_999);
    assert_eq!(rig.app.link().status(), ConnStatus::Disconnected);
    assert_eq!(rig.app.broker().status(), ConnStatus::Disconnected);

    // The reconnect posts GotIp; it is drained on the next call.
    rig.tick(11_000);
    rig.tick(11_001);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
    assert_eq!(rig.mqtt.sim_connects(), connects + 1);
    assert_eq!(rig.mqtt.sim_subscribed(), ["beacon", "beacon"]);
}

#[test]
fn auth_failures_back_off_long_and_reset_on_success() {
    let mut rig = connected_rig();

    rig.wifi.sim_fail_with(Some(REASON_AUTH_FAIL));
    rig.wifi.sim_drop(REASON_AUTH_FAIL);
    rig.tick(1_000);
    assert_eq!(rig.app.link().state().backoff_until_ms, 31_000);

    // Each full re-association fails again with an auth reason.
    let mut now = 31_000;
    for k in 1..=3 {
        rig.tick(now);
        rig.tick(now + 1);
        assert_eq!(rig.app.link().state().consecutive_auth_failures, k + 1);
        assert_eq!(rig.app.link().state().last_failure_class, FailureClass::Auth);
        now += 1 + 30_000;
    }
    assert_eq!(rig.sink.faults(FaultKind::NetworkAuthFailure), 4);

    rig.wifi.sim_fail_with(None);
    rig.tick(now);
    rig.tick(now + 1);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.app.link().state().consecutive_auth_failures, 0);

    // A transient failure afterwards uses the short backoff.
    rig.wifi.sim_drop(REASON_BEACON_TIMEOUT);
    rig.tick(now + 2);
    assert_eq!(rig.app.link().state().backoff_until_ms, now + 2 + 10_000);
}

#[test]
fn refused_broker_is_retried_on_its_own_timer() {
    let mut rig = Rig::new(MockHardware::new());
    rig.mqtt.sim_refuse(true);
    rig.start(0);
    rig.tick(0);
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);
    assert_eq!(rig.mqtt.sim_connects(), 1);
    assert_eq!(rig.sink.faults(FaultKind::BrokerConnectFailure), 1);

    rig.tick(2_999);
    assert_eq!(rig.mqtt.sim_connects(), 1);
    rig.tick(3_000);
    assert_eq!(rig.mqtt.sim_connects(), 2);

    rig.mqtt.sim_refuse(false);
    rig.tick(6_000);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
    assert_eq!(rig.published_on("filterchlorine/status"), [b"online".to_vec()]);
}

#[test]
fn broker_session_loss_is_recovered_while_link_stays_up() {
    let mut rig = Rig::new(MockHardware::new());
    rig.start(0);
    rig.tick(0);
    rig.mqtt.sim_drop();
    rig.tick(100);
    assert!(rig.sink.contains(&AppEvent::BrokerChanged(BrokerTransition::Down)));
    assert_eq!(rig.app.link().status(), ConnStatus::Connected);

    rig.tick(3_000);
    assert_eq!(rig.app.broker().status(), ConnStatus::Connected);
    assert_eq!(rig.published_on("filterchlorine/status").len(), 2);
}
