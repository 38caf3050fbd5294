//! Broker transport abstraction.
//!
//! A transport is the raw pub/sub and list-storage surface of the shared
//! broker. Everything above it (publisher, subscriber loop, caches) deals
//! only in channel names and UTF-8 JSON strings.

use super::error::BrokerError;
use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;

/// One message delivered by a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: String,
    pub payload: String,
}

/// A live subscription. The stream ends when the connection is lost.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// What a completed publish observed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishReceipt {
    /// Time spent waiting for a pooled connection
    pub acquire_wait: Duration,
    /// Number of subscribers the broker delivered to
    pub receivers: usize,
}

/// Occupancy of a transport's connection pools.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub publish_size: usize,
    pub publish_available: usize,
    pub publish_max: usize,
    pub subscriptions_active: usize,
    pub subscriptions_max: usize,
}

#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// Round-trip liveness check.
    async fn ping(&self) -> Result<(), BrokerError>;

    /// Publish one payload to a channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<PublishReceipt, BrokerError>;

    /// Subscribe to a fixed channel set on one connection.
    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream, BrokerError>;

    /// Append to the list at `key` and reset its expiry to `ttl`.
    async fn append_with_ttl(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), BrokerError>;

    /// Read and delete the list at `key` in one atomic step.
    async fn drain_list(&self, key: &str) -> Result<Vec<String>, BrokerError>;

    /// Release every pooled connection. Later calls fail with `Closed`.
    async fn close(&self);

    fn pool_status(&self) -> PoolStatus {
        PoolStatus::default()
    }

    /// Short label for logs.
    fn name(&self) -> &'static str;
}
