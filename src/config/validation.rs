//! Configuration validation functions.

use super::broker::{BrokerBackend, PoolSettings};
use super::Config;
use crate::protocol::channels::TARGET_ALL;

/// Reject configurations the coordination core cannot run with.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let name = config.server_name.trim();
    if name.is_empty() {
        anyhow::bail!("server_name must not be empty");
    }
    if name.eq_ignore_ascii_case(TARGET_ALL) {
        anyhow::bail!(
            "server_name '{name}' is reserved: control signals addressed to \"{TARGET_ALL}\" \
             target every process"
        );
    }

    if config.broker.backend == BrokerBackend::Redis {
        let parsed = url::Url::parse(&config.broker.url).map_err(|e| {
            anyhow::anyhow!("broker.url '{}' is not a valid URL: {e}", config.broker.url)
        })?;
        if !matches!(parsed.scheme(), "redis" | "rediss") {
            anyhow::bail!(
                "broker.url must use the redis:// or rediss:// scheme (got '{}://')",
                parsed.scheme()
            );
        }
    }

    validate_pool("broker.publish_pool", &config.broker.publish_pool)?;
    validate_pool("broker.subscribe_pool", &config.broker.subscribe_pool)?;

    if config.broker.connect_attempts == 0 {
        anyhow::bail!("broker.connect_attempts must be at least 1");
    }

    if config.control.checkpoints.contains(&0) {
        anyhow::bail!("control.checkpoints must be positive seconds-remaining values");
    }

    if config.control.max_delay_secs == 0 {
        anyhow::bail!("control.max_delay_secs must be at least 1");
    }

    if config.transfer.ttl_secs == 0 {
        anyhow::bail!("transfer.ttl_secs must be at least 1");
    }

    if config.notifications.ttl_secs == 0 {
        anyhow::bail!("notifications.ttl_secs must be at least 1");
    }

    Ok(())
}

fn validate_pool(label: &str, pool: &PoolSettings) -> anyhow::Result<()> {
    if pool.max_size == 0 {
        anyhow::bail!("{label}.max_size must be at least 1");
    }
    if pool.min_idle > pool.max_size {
        anyhow::bail!(
            "{label}.min_idle ({}) exceeds max_size ({})",
            pool.min_idle,
            pool.max_size
        );
    }
    Ok(())
}
