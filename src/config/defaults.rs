//! Default value functions for configuration fields.
//!
//! This module contains all the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system. Functions are organized by category for
//! easier maintenance.

use super::broker::BrokerBackend;
use super::logging::LogFormat;

// =============================================================================
// Root Config
// =============================================================================

pub fn default_server_name() -> String {
    "proxy".to_string()
}

// =============================================================================
// Broker Defaults
// =============================================================================

pub const fn default_broker_backend() -> BrokerBackend {
    BrokerBackend::Redis
}

pub fn default_broker_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

pub const fn default_publish_pool_max_size() -> usize {
    32
}

pub const fn default_publish_pool_min_idle() -> usize {
    4
}

pub const fn default_subscribe_pool_max_size() -> usize {
    2
}

pub const fn default_subscribe_pool_min_idle() -> usize {
    1
}

pub const fn default_pool_wait_timeout_ms() -> u64 {
    5_000
}

pub const fn default_pool_idle_timeout_secs() -> u64 {
    60
}

pub const fn default_pool_reap_interval_secs() -> u64 {
    30
}

pub const fn default_connect_attempts() -> u32 {
    3
}

pub const fn default_connect_timeout_ms() -> u64 {
    2_000
}

pub const fn default_subscriber_backoff_secs() -> u64 {
    5
}

pub const fn default_slow_acquire_warn_ms() -> u64 {
    100
}

pub const fn default_request_timeout_ms() -> u64 {
    5_000
}

// =============================================================================
// Server Control Defaults
// =============================================================================

pub fn default_checkpoints() -> Vec<u64> {
    vec![60, 30, 15, 10, 5, 4, 3, 2, 1]
}

/// One day
pub const fn default_max_delay_secs() -> u64 {
    86_400
}

pub const fn default_grace_period_ms() -> u64 {
    1_000
}

pub fn default_restart_kick_message() -> String {
    "Server is restarting. Please reconnect in a moment.".to_string()
}

pub fn default_shutdown_kick_message() -> String {
    "Server is shutting down.".to_string()
}

// =============================================================================
// Transfer & Notification Defaults
// =============================================================================

pub const fn default_transfer_ttl_secs() -> u64 {
    10
}

pub const fn default_notification_ttl_secs() -> u64 {
    604_800 // 7 days
}

pub fn default_notification_key_prefix() -> String {
    "pending_notifications:".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "cluster-bridge.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
