//! Sample-tick timer.
//!
//! The node runs a single cooperative loop.  Every iteration calls
//! [`NodeService::tick`](crate::app::service::NodeService::tick), which
//! advances the connectivity automata unconditionally and then asks the
//! [`SampleTimer`] whether a sample tick is due.
//!
//! ```text
//!  loop ──▶ NodeService::tick(now)
//!             ├─ LinkAutomaton::advance      (every call)
//!             ├─ BrokerAutomaton::advance    (every call)
//!             ├─ MotorCycle::advance_ramp    (every call)
//!             └─ SampleTimer::poll(now) ──▶ due?
//!                   ├─ MotorCycle::on_sample_tick
//!                   ├─ PowerIntegrator::sample
//!                   └─ TelemetrySnapshot ──▶ broker publish
//! ```
//!
//! All comparisons against the millisecond clock use wrapping
//! subtraction, so the timer keeps working across the ~49.7 day `u32`
//! rollover.

/// `true` if `now` is at or past `deadline` on a wrapping `u32` clock.
///
/// Valid as long as the two instants are less than `2^31` ms apart.
#[inline]
pub fn reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Periodic sample timer with an idempotent "force" request.
#[derive(Debug, Clone, Copy)]
pub struct SampleTimer {
    interval_ms: u32,
    next_due_at_ms: u32,
    last_fired_at_ms: Option<u32>,
    /// Set by `force()` until the forced sample is consumed.
    force_pending: bool,
}

impl SampleTimer {
    /// A timer whose first sample is due immediately.
    pub fn new(interval_ms: u32, now_ms: u32) -> Self {
        Self {
            interval_ms,
            next_due_at_ms: now_ms,
            last_fired_at_ms: None,
            force_pending: false,
        }
    }

    /// Consume a due sample.  Returns `true` (and re-arms the timer for
    /// `now + interval`) when the sample is due, `false` otherwise.
    pub fn poll(&mut self, now_ms: u32) -> bool {
        if !reached(now_ms, self.next_due_at_ms) {
            return false;
        }
        self.next_due_at_ms = now_ms.wrapping_add(self.interval_ms);
        self.last_fired_at_ms = Some(now_ms);
        self.force_pending = false;
        true
    }

    /// Make the next `poll()` treat the sample as due.
    ///
    /// Returns `false` if a force was already pending (the request is a
    /// no-op), `true` if this call moved the deadline.
    pub fn force(&mut self, now_ms: u32) -> bool {
        if self.force_pending {
            return false;
        }
        self.next_due_at_ms = now_ms;
        self.force_pending = true;
        true
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn next_due_at_ms(&self) -> u32 {
        self.next_due_at_ms
    }

    pub fn last_fired_at_ms(&self) -> Option<u32> {
        self.last_fired_at_ms
    }

    /// Fraction of the current interval already elapsed, in `[0, 1]`.
    pub fn progress(&self, now_ms: u32) -> f32 {
        let Some(last) = self.last_fired_at_ms else {
            return 1.0;
        };
        if self.interval_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.wrapping_sub(last);
        (elapsed as f32 / self.interval_ms as f32).min(1.0)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
