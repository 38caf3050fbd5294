//! Redis transport: pooled publishes, dedicated pub/sub connections.
//!
//! The subscribe side is a semaphore of `subscribe_pool.max_size` permits;
//! idle reaping and `min_idle` warm-up only touch the publish pool.

use super::error::BrokerError;
use super::transport::{
    BrokerTransport, InboundMessage, MessageStream, PoolStatus, PublishReceipt,
};
use crate::config::{BrokerConfig, PoolSettings};
use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, PoolError, Runtime};
use futures_util::{future, StreamExt};
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct RedisTransport {
    pool: Pool,
    client: redis::Client,
    subscribe_slots: Arc<Semaphore>,
    subscribe_settings: PoolSettings,
    publish_settings: PoolSettings,
    closed: CancellationToken,
}

impl RedisTransport {
    /// Build the pools without touching the network. The idle reaper starts
    /// when called inside a tokio runtime.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let client = redis::Client::open(config.url.as_str())?;

        let mut pool_config = PoolConfig::new(config.publish_pool.max_size);
        pool_config.timeouts.wait = Some(config.publish_pool.wait_timeout());
        pool_config.timeouts.create = Some(config.connect_timeout());

        let mut redis_config = deadpool_redis::Config::from_url(config.url.clone());
        redis_config.pool = Some(pool_config);
        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| BrokerError::Pool(e.to_string()))?;

        let transport = Self {
            pool,
            client,
            subscribe_slots: Arc::new(Semaphore::new(config.subscribe_pool.max_size)),
            subscribe_settings: config.subscribe_pool.clone(),
            publish_settings: config.publish_pool.clone(),
            closed: CancellationToken::new(),
        };
        transport.spawn_reaper();
        Ok(transport)
    }

    fn spawn_reaper(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available; redis idle reaper not started");
            return;
        };

        let pool = self.pool.clone();
        let settings = self.publish_settings.clone();
        let closed = self.closed.clone();

        handle.spawn(async move {
            let mut interval = tokio::time::interval(settings.reap_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = closed.cancelled() => break,
                    _ = interval.tick() => {
                        reap_idle(&pool, &settings);
                        warm_up(&pool, settings.min_idle).await;
                    }
                }
            }
        });
    }

    async fn connection(&self) -> Result<(deadpool_redis::Connection, Duration), BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::Closed);
        }
        let started = Instant::now();
        let conn = self.pool.get().await.map_err(map_pool_error)?;
        Ok((conn, started.elapsed()))
    }
}

/// Drop connections idle past `idle_timeout`, never shrinking below `min_idle`.
fn reap_idle(pool: &Pool, settings: &PoolSettings) {
    let status = pool.status();
    let removable = Cell::new(status.size.saturating_sub(settings.min_idle));
    if removable.get() == 0 {
        return;
    }

    let idle_timeout = settings.idle_timeout();
    let _ = pool.retain(|_, metrics| {
        if removable.get() > 0 && metrics.last_used() > idle_timeout {
            removable.set(removable.get() - 1);
            return false;
        }
        true
    });
}

async fn warm_up(pool: &Pool, min_idle: usize) {
    let missing = min_idle.saturating_sub(pool.status().size);
    if missing == 0 {
        return;
    }

    let mut held = Vec::with_capacity(missing);
    for _ in 0..missing {
        match pool.get().await {
            Ok(conn) => held.push(conn),
            Err(e) => {
                debug!(error = %e, "Could not pre-open idle redis connection");
                break;
            }
        }
    }
}

fn map_pool_error(err: PoolError) -> BrokerError {
    match err {
        PoolError::Timeout(_) => BrokerError::PoolTimeout,
        PoolError::Closed => BrokerError::Closed,
        PoolError::Backend(e) => e.into(),
        other => BrokerError::Pool(other.to_string()),
    }
}

#[async_trait]
impl BrokerTransport for RedisTransport {
    async fn ping(&self) -> Result<(), BrokerError> {
        let (mut conn, _) = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<PublishReceipt, BrokerError> {
        let (mut conn, acquire_wait) = self.connection().await?;
        let receivers: usize = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        Ok(PublishReceipt {
            acquire_wait,
            receivers,
        })
    }

    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream, BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::Closed);
        }

        let permit = tokio::time::timeout(
            self.subscribe_settings.wait_timeout(),
            Arc::clone(&self.subscribe_slots).acquire_owned(),
        )
        .await
        .map_err(|_| BrokerError::PoolTimeout)?
        .map_err(|_| BrokerError::Closed)?;

        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channels.to_vec()).await?;

        let closed = self.closed.clone();
        let stream = pubsub
            .into_on_message()
            .filter_map(move |msg| {
                // The slot is released when the stream is dropped.
                let _slot = &permit;
                let channel = msg.get_channel_name().to_string();
                let inbound = match msg.get_payload::<String>() {
                    Ok(payload) => Some(InboundMessage { channel, payload }),
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping non-UTF-8 payload");
                        None
                    }
                };
                future::ready(inbound)
            })
            .take_until(async move { closed.cancelled().await });

        Ok(Box::pin(stream))
    }

    async fn append_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), BrokerError> {
        let (mut conn, _) = self.connection().await?;
        let (): () = redis::pipe()
            .atomic()
            .cmd("RPUSH")
            .arg(key)
            .arg(value)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn drain_list(&self, key: &str) -> Result<Vec<String>, BrokerError> {
        let (mut conn, _) = self.connection().await?;
        let (items,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(key, 0, -1)
            .del(key)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn close(&self) {
        self.closed.cancel();
        self.subscribe_slots.close();
        self.pool.close();
    }

    fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        let subscriptions_max = self.subscribe_settings.max_size;
        PoolStatus {
            publish_size: status.size,
            publish_available: status.available,
            publish_max: status.max_size,
            subscriptions_active: subscriptions_max
                .saturating_sub(self.subscribe_slots.available_permits()),
            subscriptions_max,
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
