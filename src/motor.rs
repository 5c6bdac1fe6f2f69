//! Anti-fouling motor cycle controller.
//!
//! Unidirectional flow fouls the probe, so the motor spends a fraction
//! of sample ticks running in reverse.  Each sample tick increments
//! `minute_count`:
//!
//! - **Forward** → reverse once `minute_count * reverse_ratio >= 1.0`
//! - **Reverse** → forward once `minute_count >= 1`
//!
//! Reverse phases therefore last exactly one sample tick whatever the
//! ratio; only the forward phase length varies (`ceil(1 / ratio)` ticks).
//!
//! Direction changes may ramp the PWM duty up over several scheduler
//! calls ([`Phase::Ramping`]) instead of stepping it inside one call.
//! The ramp is advanced by [`MotorCycle::advance_ramp`], never by a
//! delay loop.
//!
//! The controller is a dumb orchestrator: it never touches hardware
//! directly, only the [`ActuatorPort`].  If the driver failed to
//! initialise, every operation is skipped and the node reports a
//! degraded state.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::ActuatorPort;
use crate::config::NodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }
}

/// Ramp sub-state for direction changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Driver output equals the commanded speed.
    Steady,
    /// Driver output is climbing towards `target`, one step per call.
    Ramping { target: u16 },
}

/// Observable motor state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorState {
    /// Speed currently applied to the driver (PWM counts).
    pub speed: u16,
    pub direction: Direction,
    /// Sample ticks since the last direction flip.
    pub minute_count: u32,
    pub reverse_ratio: f32,
    /// Lifetime count of forward → reverse flips.
    pub reverse_count: u32,
    /// False if the driver failed to initialise.
    pub available: bool,
}

/// Result of one sample tick, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Actuator unavailable; nothing was done.
    Skipped,
    /// Direction unchanged.
    Held,
    /// Switched forward → reverse.
    Reversed,
    /// Switched reverse → forward.
    Resumed,
}

pub struct MotorCycle {
    state: MotorState,
    phase: Phase,
    /// Speed used by the duty cycle and direction overrides.
    cycle_speed: u16,
    max_speed: u16,
    ramp_step: u16,
}

impl MotorCycle {
    pub fn new(config: &NodeConfig, available: bool) -> Self {
        Self {
            state: MotorState {
                speed: 0,
                direction: Direction::Forward,
                minute_count: 0,
                reverse_ratio: config.reverse_ratio,
                reverse_count: 0,
                available,
            },
            phase: Phase::Steady,
            cycle_speed: config.motor_speed.min(config.motor_max_speed),
            max_speed: config.motor_max_speed,
            ramp_step: config.motor_ramp_step,
        }
    }

    /// Start the motor forward at the cycle speed (boot state).
    pub fn start(&mut self, hw: &mut impl ActuatorPort) {
        if !self.state.available {
            warn!("Motor: driver unavailable, duty cycle disabled");
            return;
        }
        self.switch(Direction::Forward, self.cycle_speed, hw);
        info!("Motor: started forward at {}", self.cycle_speed);
    }

    // ── Per-tick ──────────────────────────────────────────────

    /// Advance the duty cycle by one sample tick.
    pub fn on_sample_tick(&mut self, hw: &mut impl ActuatorPort) -> CycleOutcome {
        if !self.state.available {
            return CycleOutcome::Skipped;
        }

        self.state.minute_count = self.state.minute_count.saturating_add(1);

        match self.state.direction {
            Direction::Forward
                if self.state.minute_count as f32 * self.state.reverse_ratio >= 1.0 =>
            {
                self.switch(Direction::Reverse, self.cycle_speed, hw);
                self.state.reverse_count = self.state.reverse_count.wrapping_add(1);
                self.state.minute_count = 0;
                info!("Motor: reverse #{}", self.state.reverse_count);
                CycleOutcome::Reversed
            }
            Direction::Reverse if self.state.minute_count >= 1 => {
                self.switch(Direction::Forward, self.cycle_speed, hw);
                self.state.minute_count = 0;
                info!("Motor: forward");
                CycleOutcome::Resumed
            }
            _ => CycleOutcome::Held,
        }
    }

    /// Step an in-progress ramp.  Called on every scheduler invocation;
    /// a no-op while `Steady`.
    pub fn advance_ramp(&mut self, hw: &mut impl ActuatorPort) {
        let Phase::Ramping { target } = self.phase else {
            return;
        };
        if !self.state.available {
            self.phase = Phase::Steady;
            return;
        }
        let next = self.state.speed.saturating_add(self.ramp_step).min(target);
        hw.drive(self.state.direction, next);
        self.state.speed = next;
        if next >= target {
            self.phase = Phase::Steady;
        }
    }

    // ── External overrides (bypass the cycle counter) ────────

    /// Change speed, preserving direction.  A stopped motor restarts
    /// forward, as the MD13S/MD135 drivers do.
    pub fn set_speed(&mut self, speed: u16, hw: &mut impl ActuatorPort) -> bool {
        if !self.guard("speed") {
            return false;
        }
        let speed = speed.min(self.max_speed);
        let dir = if self.state.speed == 0 && self.phase == Phase::Steady {
            Direction::Forward
        } else {
            self.state.direction
        };
        self.phase = Phase::Steady;
        hw.drive(dir, speed);
        self.state.direction = dir;
        self.state.speed = speed;
        true
    }

    pub fn forward(&mut self, hw: &mut impl ActuatorPort) -> bool {
        if !self.guard("forward") {
            return false;
        }
        self.switch(Direction::Forward, self.cycle_speed, hw);
        true
    }

    pub fn reverse(&mut self, hw: &mut impl ActuatorPort) -> bool {
        if !self.guard("reverse") {
            return false;
        }
        self.switch(Direction::Reverse, self.cycle_speed, hw);
        true
    }

    pub fn stop(&mut self, hw: &mut impl ActuatorPort) -> bool {
        if !self.guard("stop") {
            return false;
        }
        hw.stop();
        self.phase = Phase::Steady;
        self.state.speed = 0;
        true
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> &MotorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_degraded(&self) -> bool {
        !self.state.available
    }

    // ── Internal ──────────────────────────────────────────────

    fn guard(&self, what: &str) -> bool {
        if !self.state.available {
            warn!("Motor: '{}' ignored, driver unavailable", what);
        }
        self.state.available
    }

    /// Set direction and begin (or complete) the speed change.
    fn switch(&mut self, direction: Direction, speed: u16, hw: &mut impl ActuatorPort) {
        self.state.direction = direction;
        if self.ramp_step == 0 || speed <= self.ramp_step {
            hw.drive(direction, speed);
            self.state.speed = speed;
            self.phase = Phase::Steady;
        } else {
            hw.drive(direction, self.ramp_step);
            self.state.speed = self.ramp_step;
            self.phase = Phase::Ramping { target: speed };
        }
    }
}
