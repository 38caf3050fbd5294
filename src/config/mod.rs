//! Configuration module for the cluster bridge.
//!
//! This module provides configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`broker`]: Broker backend, URL and connection pool settings
//! - [`control`]: Countdown, transfer and pending-notification settings
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod broker;
pub mod control;
pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use broker::{BrokerBackend, BrokerConfig, PoolSettings};

pub use control::{ControlConfig, NotificationConfig, TransferConfig};

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use types::Config;

pub use validation::validate_config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.server_name, "proxy");
        assert_eq!(config.broker.backend, BrokerBackend::Redis);
        assert_eq!(config.broker.url, "redis://127.0.0.1:6379");
        assert_eq!(config.broker.publish_pool.max_size, 32);
        assert_eq!(config.broker.publish_pool.min_idle, 4);
        assert_eq!(config.broker.publish_pool.wait_timeout_ms, 5_000);
        assert_eq!(config.broker.subscribe_pool.max_size, 2);
        assert_eq!(config.broker.subscriber_backoff_secs, 5);
        assert_eq!(config.broker.slow_acquire_warn_ms, 100);

        assert_eq!(
            config.control.checkpoints,
            vec![60, 30, 15, 10, 5, 4, 3, 2, 1]
        );
        assert_eq!(config.transfer.ttl_secs, 10);
        assert_eq!(config.notifications.ttl_secs, 604_800);

        assert_eq!(config.logging.dir, "logs");
        assert_eq!(config.logging.rotation, "daily");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(config.server_name, deserialized.server_name);
        assert_eq!(config.broker.publish_pool, deserialized.broker.publish_pool);
        assert_eq!(config.control.checkpoints, deserialized.control.checkpoints);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"server_name": "survival", "broker": {"backend": "memory"}}"#,
        )
        .unwrap();

        assert_eq!(config.server_name, "survival");
        assert_eq!(config.broker.backend, BrokerBackend::Memory);
        assert_eq!(config.broker.publish_pool.max_size, 32);
        assert_eq!(config.control.grace_period_ms, 1_000);
    }

    #[test]
    fn test_log_level_parsing_is_lenient() {
        let config: LoggingConfig = serde_json::from_str(r#"{"level": "WARNING"}"#).unwrap();
        assert_eq!(config.level, Some(LogLevel::Warn));

        let config: LoggingConfig = serde_json::from_str(r#"{"level": ["debug"]}"#).unwrap();
        assert_eq!(config.level, Some(LogLevel::Debug));

        let config: LoggingConfig = serde_json::from_str(r#"{"level": "loud"}"#).unwrap();
        assert_eq!(config.level, None);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }
}
