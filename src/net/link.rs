//! WiFi link automaton.
//!
//! The WiFi driver reports outcomes from its own event context.  Those
//! callbacks never touch [`LinkState`]: they post a [`LinkEvent`] into a
//! critical-section guarded channel through a cloned
//! [`LinkEventHandle`], and the scheduler drains the channel at the start
//! of every [`LinkAutomaton::advance`].  All state is therefore mutated
//! from one context only, and a reconnect decision always sees every
//! event posted before it.
//!
//! ## Reconnection policy
//!
//! | Disconnect cause                          | Action                    |
//! |-------------------------------------------|---------------------------|
//! | user-initiated                            | no reconnect              |
//! | first one since boot, before any `GotIp`  | not a failure; fallback reconnect, 10 s |
//! | auth / handshake / association / timeout  | full re-association, 30 s |
//! | anything else                             | lightweight reconnect, 10 s |
//!
//! The boot window closes on the first `GotIp` or the first disconnect,
//! whichever comes first.  A teardown reported while the initial
//! association is still in flight therefore never starts an immediate
//! reconnect, but an initial association that fails outright is retried.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};

use crate::app::ports::LinkDriver;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::net::ConnStatus;
use crate::scheduler::reached;

// ───────────────────────────────────────────────────────────────
// Disconnect reason codes (IEEE 802.11 / ESP-IDF `wifi_err_reason_t`)
// ───────────────────────────────────────────────────────────────

pub const REASON_AUTH_EXPIRE: u8 = 2;
pub const REASON_ASSOC_LEAVE: u8 = 8;
pub const REASON_TIMEOUT: u8 = 39;
pub const REASON_AUTH_FAIL: u8 = 202;
pub const REASON_ASSOC_FAIL: u8 = 203;
pub const REASON_HANDSHAKE_TIMEOUT: u8 = 204;
pub const REASON_CONNECTION_FAIL: u8 = 205;

const EVENT_QUEUE_DEPTH: usize = 8;

/// Class of the most recent failure; selects backoff and reconnect style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureClass {
    #[default]
    None,
    Transient,
    Auth,
}

/// Map a driver disconnect reason to its failure class.
pub fn classify_reason(reason: u8) -> FailureClass {
    match reason {
        REASON_AUTH_EXPIRE
        | REASON_AUTH_FAIL
        | REASON_ASSOC_FAIL
        | REASON_HANDSHAKE_TIMEOUT
        | REASON_CONNECTION_FAIL
        | REASON_TIMEOUT => FailureClass::Auth,
        _ => FailureClass::Transient,
    }
}

/// Outcome reported by the WiFi driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Associated and obtained an IP address.
    GotIp,
    Disconnected { reason: u8 },
}

type EventChannel = Channel<CriticalSectionRawMutex, LinkEvent, EVENT_QUEUE_DEPTH>;

/// Cloneable producer end handed to the driver's event callback.
#[derive(Clone)]
pub struct LinkEventHandle {
    channel: Arc<EventChannel>,
}

impl LinkEventHandle {
    /// Post an event.  Safe to call from the driver's event task.
    /// Returns `false` if the queue was full and the event was dropped.
    pub fn post(&self, event: LinkEvent) -> bool {
        self.channel.try_send(event).is_ok()
    }
}

/// What changed during one [`LinkAutomaton::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTransition {
    Up,
    Down {
        reason: u8,
        class: FailureClass,
        /// Whether a reconnect is scheduled.
        will_retry: bool,
    },
    /// A reconnect attempt was started.
    Retrying { class: FailureClass },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkState {
    pub status: ConnStatus,
    pub user_initiated_disconnect: bool,
    pub consecutive_auth_failures: u32,
    pub backoff_until_ms: u32,
    pub last_failure_class: FailureClass,
    pub should_reconnect: bool,
    /// Set on the first `GotIp` or the first disconnect after boot.
    pub boot_settled: bool,
}

pub struct LinkAutomaton {
    state: LinkState,
    events: Arc<EventChannel>,
    short_backoff_ms: u32,
    long_backoff_ms: u32,
}

impl LinkAutomaton {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            state: LinkState::default(),
            events: Arc::new(Channel::new()),
            short_backoff_ms: config.link_short_backoff_ms,
            long_backoff_ms: config.link_long_backoff_ms,
        }
    }

    /// Producer handle for the driver's event callback.
    pub fn event_handle(&self) -> LinkEventHandle {
        LinkEventHandle {
            channel: Arc::clone(&self.events),
        }
    }

    /// Start the initial association and enable automatic reconnection.
    pub fn begin(&mut self, now_ms: u32, driver: &mut impl LinkDriver) -> Result<()> {
        self.state.user_initiated_disconnect = false;
        self.state.should_reconnect = true;
        self.state.status = ConnStatus::Connecting;
        info!("Link: connecting");
        if let Err(e) = driver.begin() {
            warn!("Link: association request rejected ({})", e);
            self.state.status = ConnStatus::Disconnected;
            self.state.backoff_until_ms = now_ms.wrapping_add(self.short_backoff_ms);
            return Err(e.into());
        }
        Ok(())
    }

    /// Leave the network on request.  No reconnect follows until the
    /// next [`begin`](Self::begin).
    ///
    /// No console command calls this; a leave requested outside the node
    /// is recognised by its reason code ([`REASON_ASSOC_LEAVE`]) instead.
    pub fn disconnect(&mut self, driver: &mut impl LinkDriver) {
        self.state.user_initiated_disconnect = true;
        self.state.should_reconnect = false;
        info!("Link: disconnect requested");
        driver.disconnect();
    }

    /// Drain pending driver events, then start a reconnect if one is due.
    pub fn advance(
        &mut self,
        now_ms: u32,
        driver: &mut impl LinkDriver,
        mut report: impl FnMut(LinkTransition),
    ) {
        while let Ok(event) = self.events.try_receive() {
            if let Some(t) = self.apply(now_ms, event) {
                report(t);
            }
        }

        let s = &self.state;
        if s.status != ConnStatus::Disconnected
            || !s.should_reconnect
            || !reached(now_ms, s.backoff_until_ms)
        {
            return;
        }

        let class = self.state.last_failure_class;
        self.state.status = ConnStatus::Connecting;
        let started = if class == FailureClass::Auth {
            info!("Link: re-associating after auth failure");
            driver.begin()
        } else {
            info!("Link: reconnecting");
            driver.reconnect()
        };
        match started {
            Ok(()) => report(LinkTransition::Retrying { class }),
            Err(e) => {
                warn!("Link: reconnect request rejected ({}), retrying later", e);
                self.state.status = ConnStatus::Disconnected;
                self.state.backoff_until_ms = now_ms.wrapping_add(self.short_backoff_ms);
            }
        }
    }

    fn apply(&mut self, now_ms: u32, event: LinkEvent) -> Option<LinkTransition> {
        match event {
            LinkEvent::GotIp => {
                let was_up = self.state.status == ConnStatus::Connected;
                self.state.status = ConnStatus::Connected;
                self.state.consecutive_auth_failures = 0;
                self.state.last_failure_class = FailureClass::None;
                self.state.user_initiated_disconnect = false;
                self.state.boot_settled = true;
                if was_up {
                    return None;
                }
                info!("Link: connected");
                Some(LinkTransition::Up)
            }
            LinkEvent::Disconnected { reason } => {
                self.state.status = ConnStatus::Disconnected;
                let booting = !self.state.boot_settled;
                self.state.boot_settled = true;
                let user = self.state.user_initiated_disconnect
                    || (reason == REASON_ASSOC_LEAVE && !booting);

                if user {
                    self.state.should_reconnect = false;
                    self.state.last_failure_class = FailureClass::None;
                    info!("Link: disconnected (reason {}), not reconnecting", reason);
                    return Some(LinkTransition::Down {
                        reason,
                        class: FailureClass::None,
                        will_retry: false,
                    });
                }

                if booting {
                    self.state.should_reconnect = true;
                    self.state.last_failure_class = FailureClass::None;
                    self.state.backoff_until_ms = now_ms.wrapping_add(self.short_backoff_ms);
                    info!(
                        "Link: disconnected during boot association (reason {}), fallback retry in {} ms",
                        reason, self.short_backoff_ms
                    );
                    return Some(LinkTransition::Down {
                        reason,
                        class: FailureClass::None,
                        will_retry: true,
                    });
                }

                let class = classify_reason(reason);
                let backoff = match class {
                    FailureClass::Auth => {
                        self.state.consecutive_auth_failures =
                            self.state.consecutive_auth_failures.saturating_add(1);
                        self.long_backoff_ms
                    }
                    _ => self.short_backoff_ms,
                };
                self.state.last_failure_class = class;
                self.state.should_reconnect = true;
                self.state.backoff_until_ms = now_ms.wrapping_add(backoff);
                warn!(
                    "Link: lost (reason {}, {:?}), retry in {} ms",
                    reason, class, backoff
                );
                Some(LinkTransition::Down {
                    reason,
                    class,
                    will_retry: true,
                })
            }
        }
    }

    pub fn status(&self) -> ConnStatus {
        self.state.status
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }
}
