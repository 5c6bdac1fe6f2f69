//! Inbound commands to the application service.
//!
//! Issued by the serial console (or tests) and interpreted by
//! [`NodeService::handle_command`](super::service::NodeService::handle_command).
//! Motor overrides act immediately and do not touch the duty-cycle
//! counter.

use crate::power::PowerSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    /// Take a sample on the next scheduler call.
    Force,
    /// Set motor speed, keeping direction.
    Speed(u16),
    Forward,
    Reverse,
    Stop,
    /// Read the power monitor now and report the result.
    Power,
    /// Request a reboot.
    Reboot,
}

impl NodeCommand {
    /// Parse one console line, e.g. `speed 120`.  Case-insensitive;
    /// surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let cmd = match verb.to_ascii_lowercase().as_str() {
            "force" => Self::Force,
            "speed" => Self::Speed(words.next()?.parse().ok()?),
            "forward" => Self::Forward,
            "reverse" => Self::Reverse,
            "stop" => Self::Stop,
            "power" => Self::Power,
            "reboot" => Self::Reboot,
            _ => return None,
        };
        words.next().is_none().then_some(cmd)
    }
}

/// Reply to a [`NodeCommand`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandReply {
    Accepted,
    /// Valid, but had no effect (already pending, actuator unavailable).
    Ignored,
    Power(PowerSample),
}
