//! Server control, transfer tracking and pending notification settings.

use super::defaults::{
    default_checkpoints, default_grace_period_ms, default_max_delay_secs,
    default_notification_key_prefix,
    default_notification_ttl_secs, default_restart_kick_message, default_shutdown_kick_message,
    default_transfer_ttl_secs,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Countdown behaviour for coordinated restarts and shutdowns.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ControlConfig {
    /// Seconds-remaining marks that trigger a warning broadcast
    #[serde(default = "default_checkpoints")]
    pub checkpoints: Vec<u64>,
    /// Longest countdown accepted from a signal; longer delays are rejected
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    /// Pause between kicking players and stopping the process (milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_restart_kick_message")]
    pub restart_kick_message: String,
    #[serde(default = "default_shutdown_kick_message")]
    pub shutdown_kick_message: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            checkpoints: default_checkpoints(),
            max_delay_secs: default_max_delay_secs(),
            grace_period_ms: default_grace_period_ms(),
            restart_kick_message: default_restart_kick_message(),
            shutdown_kick_message: default_shutdown_kick_message(),
        }
    }
}

impl ControlConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransferConfig {
    #[serde(default = "default_transfer_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_transfer_ttl_secs(),
        }
    }
}

impl TransferConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotificationConfig {
    /// Lifetime of a player's queue, refreshed on every append (seconds)
    #[serde(default = "default_notification_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_notification_key_prefix")]
    pub key_prefix: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_notification_ttl_secs(),
            key_prefix: default_notification_key_prefix(),
        }
    }
}

impl NotificationConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
