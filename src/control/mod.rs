//! Coordinated restart and shutdown across the cluster.
//!
//! A `server.control` envelope names a target (`all` or one process) and a
//! delay. Each targeted process runs its own countdown, measured from the
//! moment it received the signal.

pub mod coordinator;

pub use coordinator::{CountdownTask, CoordinatorState, ServerControlCoordinator, SignalOutcome};

use crate::protocol::channels::TARGET_ALL;
use crate::protocol::{ControlAction, ServerControlMessage};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Seconds-remaining marks announced during a countdown.
pub const DEFAULT_CHECKPOINTS: [u64; 9] = [60, 30, 15, 10, 5, 4, 3, 2, 1];

#[derive(Debug, Error)]
pub enum ControlError {
    /// The host cannot restart itself; callers fall back to shutdown.
    #[error("restart is not available on this host")]
    RestartUnavailable,
    #[error("restart failed: {0}")]
    RestartFailed(String),
}

/// A restart or shutdown order as applied by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerControlSignal {
    pub action: ControlAction,
    pub target: String,
    pub delay_seconds: u64,
    pub reason: String,
    pub issued_by: String,
}

impl ServerControlSignal {
    pub fn new(action: ControlAction, target: impl Into<String>, delay_seconds: u64) -> Self {
        Self {
            action,
            target: target.into(),
            delay_seconds,
            reason: String::new(),
            issued_by: String::new(),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn issued_by(mut self, staff: impl Into<String>) -> Self {
        self.issued_by = staff.into();
        self
    }

    /// Whether a process named `self_name` must act on this signal.
    pub fn targets(&self, self_name: &str) -> bool {
        self.target.eq_ignore_ascii_case(TARGET_ALL) || self.target == self_name
    }

    pub fn to_message(&self) -> ServerControlMessage {
        ServerControlMessage {
            action: self.action,
            server: self.target.clone(),
            delay: self.delay_seconds,
            reason: self.reason.clone(),
            staff_name: self.issued_by.clone(),
        }
    }
}

impl From<ServerControlMessage> for ServerControlSignal {
    fn from(message: ServerControlMessage) -> Self {
        Self {
            action: message.action,
            target: message.server,
            delay_seconds: message.delay,
            reason: message.reason,
            issued_by: message.staff_name,
        }
    }
}

/// One scheduled warning broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Seconds left when the warning fires
    pub remaining: u64,
    /// Time after signal receipt at which it fires
    pub offset: Duration,
}

/// Checkpoints strictly below `delay`, earliest first.
pub fn checkpoint_schedule(delay_seconds: u64, checkpoints: &[u64]) -> Vec<Checkpoint> {
    let mut marks: Vec<u64> = checkpoints
        .iter()
        .copied()
        .filter(|&c| c > 0 && c < delay_seconds)
        .collect();
    marks.sort_unstable_by(|a, b| b.cmp(a));
    marks.dedup();

    marks
        .into_iter()
        .map(|remaining| Checkpoint {
            remaining,
            offset: Duration::from_secs(delay_seconds - remaining),
        })
        .collect()
}

/// Human wording for a number of seconds: `1 second`, `30 seconds`,
/// `2 minutes`, `1 minute 30 seconds`.
pub fn format_remaining(seconds: u64) -> String {
    fn unit(n: u64, word: &str) -> String {
        if n == 1 {
            format!("1 {word}")
        } else {
            format!("{n} {word}s")
        }
    }

    let (minutes, secs) = (seconds / 60, seconds % 60);
    match (minutes, secs) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} {}", unit(m, "minute"), unit(s, "second")),
    }
}

/// What the host reports for `status.request`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostStatus {
    pub online: bool,
    pub player_count: u32,
    pub max_players: u32,
    pub tps: f64,
}

impl Default for HostStatus {
    fn default() -> Self {
        Self {
            online: true,
            player_count: 0,
            max_players: 0,
            tps: 20.0,
        }
    }
}

/// Side effects the embedding server exposes to the coordinator. Every call
/// is made from the host context.
pub trait ServerHost: Send + Sync + 'static {
    /// Send a message to every connected player.
    fn broadcast(&self, message: &str);

    /// Disconnect every connected player with `message`.
    fn disconnect_all(&self, message: &str);

    /// Restart the process. `Err` makes the coordinator shut down instead.
    fn restart(&self) -> Result<(), ControlError>;

    fn shutdown(&self);

    fn status(&self) -> HostStatus {
        HostStatus::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_thirty_second_delay_schedule() {
        let schedule = checkpoint_schedule(30, &DEFAULT_CHECKPOINTS);
        let remaining: Vec<u64> = schedule.iter().map(|c| c.remaining).collect();
        assert_eq!(remaining, vec![15, 10, 5, 4, 3, 2, 1]);

        let offsets: Vec<u64> = schedule.iter().map(|c| c.offset.as_secs()).collect();
        assert_eq!(offsets, vec![15, 20, 25, 26, 27, 28, 29]);
    }

    #[test]
    fn test_short_and_zero_delays() {
        assert!(checkpoint_schedule(1, &DEFAULT_CHECKPOINTS).is_empty());
        assert!(checkpoint_schedule(0, &DEFAULT_CHECKPOINTS).is_empty());
        let remaining: Vec<u64> = checkpoint_schedule(10, &DEFAULT_CHECKPOINTS)
            .iter()
            .map(|c| c.remaining)
            .collect();
        assert_eq!(remaining, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_targets() {
        let signal = ServerControlSignal::new(ControlAction::Restart, "ALL", 10);
        assert!(signal.targets("survival"));

        let signal = ServerControlSignal::new(ControlAction::Shutdown, "survival", 10);
        assert!(signal.targets("survival"));
        assert!(!signal.targets("creative"));
    }

    #[test]
    fn test_message_round_trip() {
        let signal = ServerControlSignal::new(ControlAction::Restart, "all", 10)
            .with_reason("patch")
            .issued_by("Admin");
        assert_eq!(ServerControlSignal::from(signal.to_message()), signal);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(1), "1 second");
        assert_eq!(format_remaining(30), "30 seconds");
        assert_eq!(format_remaining(60), "1 minute");
        assert_eq!(format_remaining(90), "1 minute 30 seconds");
        assert_eq!(format_remaining(300), "5 minutes");
    }

    proptest! {
        #[test]
        fn prop_schedule_is_strictly_below_delay(delay in 0u64..600) {
            let schedule = checkpoint_schedule(delay, &DEFAULT_CHECKPOINTS);
            let mut last_offset = Duration::ZERO;
            for checkpoint in &schedule {
                prop_assert!(checkpoint.remaining < delay);
                prop_assert_eq!(checkpoint.offset.as_secs() + checkpoint.remaining, delay);
                prop_assert!(checkpoint.offset >= last_offset);
                last_offset = checkpoint.offset;
            }
            let expected = DEFAULT_CHECKPOINTS.iter().filter(|&&c| c < delay).count();
            prop_assert_eq!(schedule.len(), expected);
        }
    }
}
