//! Broker connection and pool configuration types.

use super::defaults::{
    default_broker_backend, default_broker_url, default_connect_attempts,
    default_connect_timeout_ms, default_pool_idle_timeout_secs, default_pool_reap_interval_secs,
    default_pool_wait_timeout_ms, default_publish_pool_max_size, default_publish_pool_min_idle,
    default_request_timeout_ms, default_slow_acquire_warn_ms, default_subscribe_pool_max_size,
    default_subscribe_pool_min_idle, default_subscriber_backoff_secs,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which transport backs the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerBackend {
    /// Shared Redis instance (multi-process deployments)
    #[default]
    Redis,
    /// Process-local loopback broker (single-process development)
    Memory,
}

/// Broker configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_backend")]
    pub backend: BrokerBackend,
    /// Connection URL, e.g. `redis://:password@10.0.0.5:6379/0`
    #[serde(default = "default_broker_url")]
    pub url: String,
    #[serde(default = "PoolSettings::publish_defaults")]
    pub publish_pool: PoolSettings,
    /// Each subscription holds its own dedicated pub/sub connection, so only
    /// `max_size` and `wait_timeout_ms` apply here. `min_idle` and
    /// `idle_timeout_secs` are checked by validation but have no effect.
    #[serde(default = "PoolSettings::subscribe_defaults")]
    pub subscribe_pool: PoolSettings,
    /// Liveness check attempts before falling back to degraded mode
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Per-attempt timeout for the liveness check (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Fixed delay before the subscriber loop retries a lost subscription (seconds)
    #[serde(default = "default_subscriber_backoff_secs")]
    pub subscriber_backoff_secs: u64,
    /// Pool acquisition latency above which publishes log a warning (milliseconds)
    #[serde(default = "default_slow_acquire_warn_ms")]
    pub slow_acquire_warn_ms: u64,
    /// Default wait for `*.response` envelopes (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: default_broker_backend(),
            url: default_broker_url(),
            publish_pool: PoolSettings::publish_defaults(),
            subscribe_pool: PoolSettings::subscribe_defaults(),
            connect_attempts: default_connect_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            subscriber_backoff_secs: default_subscriber_backoff_secs(),
            slow_acquire_warn_ms: default_slow_acquire_warn_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn subscriber_backoff(&self) -> Duration {
        Duration::from_secs(self.subscriber_backoff_secs)
    }

    pub fn slow_acquire_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_acquire_warn_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Sizing and eviction policy for one connection pool.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: usize,
    /// Idle connections kept even when they exceed `idle_timeout_secs`
    pub min_idle: usize,
    /// Maximum time a borrow waits for a free connection (milliseconds)
    #[serde(default = "default_pool_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_pool_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

impl PoolSettings {
    pub fn publish_defaults() -> Self {
        Self {
            max_size: default_publish_pool_max_size(),
            min_idle: default_publish_pool_min_idle(),
            wait_timeout_ms: default_pool_wait_timeout_ms(),
            idle_timeout_secs: default_pool_idle_timeout_secs(),
            reap_interval_secs: default_pool_reap_interval_secs(),
        }
    }

    pub fn subscribe_defaults() -> Self {
        Self {
            max_size: default_subscribe_pool_max_size(),
            min_idle: default_subscribe_pool_min_idle(),
            ..Self::publish_defaults()
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
