//! Per-player notification lists kept in the broker store.

use crate::broker::BrokerConnection;
use crate::config::NotificationConfig;
use crate::protocol::PlayerId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Messages waiting for a player who is offline or on another process.
///
/// Appends refresh the list's expiry; [`drain_all`](Self::drain_all) reads
/// and deletes the list in one atomic broker operation.
#[derive(Clone)]
pub struct PendingNotificationQueue {
    connection: Arc<BrokerConnection>,
    key_prefix: Arc<str>,
    ttl: Duration,
}

impl PendingNotificationQueue {
    pub fn new(connection: Arc<BrokerConnection>, config: &NotificationConfig) -> Self {
        Self {
            connection,
            key_prefix: Arc::from(config.key_prefix.as_str()),
            ttl: config.ttl(),
        }
    }

    pub fn key_for(&self, player_id: &PlayerId) -> String {
        format!("{}{}", self.key_prefix, player_id)
    }

    /// Fire-and-forget append. Returns immediately.
    pub fn enqueue(&self, player_id: PlayerId, message: impl Into<String>) {
        if !self.connection.is_connected() {
            debug!(player = %player_id, "Broker disconnected; notification dropped");
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(player = %player_id, "No tokio runtime available; notification dropped");
            return;
        };

        let queue = self.clone();
        let message = message.into();
        handle.spawn(async move {
            queue.append(player_id, &message).await;
        });
    }

    /// Append on the caller's task. Returns whether the broker accepted it.
    pub async fn append(&self, player_id: PlayerId, message: &str) -> bool {
        let Some(transport) = self.connection.transport() else {
            return false;
        };

        match transport
            .append_with_ttl(&self.key_for(&player_id), message, self.ttl)
            .await
        {
            Ok(()) => {
                self.connection.metrics().increment_notifications_enqueued();
                true
            }
            Err(e) => {
                warn!(player = %player_id, error = %e, "Failed to queue notification");
                false
            }
        }
    }

    /// Read and clear every queued message for the player, oldest first.
    pub async fn drain_all(&self, player_id: &PlayerId) -> Vec<String> {
        let Some(transport) = self.connection.transport() else {
            return Vec::new();
        };

        match transport.drain_list(&self.key_for(player_id)).await {
            Ok(messages) => {
                self.connection
                    .metrics()
                    .add_notifications_drained(messages.len() as u64);
                messages
            }
            Err(e) => {
                warn!(player = %player_id, error = %e, "Failed to drain notifications");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::config::{BrokerBackend, BrokerConfig};
    use crate::metrics::CoordinationMetrics;
    use uuid::Uuid;

    async fn queue(hub: &InMemoryBroker) -> PendingNotificationQueue {
        let connection = Arc::new(BrokerConnection::new(
            Arc::new(hub.handle()),
            BrokerConfig {
                backend: BrokerBackend::Memory,
                ..BrokerConfig::default()
            },
            Arc::new(CoordinationMetrics::new()),
        ));
        connection.connect().await.unwrap();
        PendingNotificationQueue::new(connection, &NotificationConfig::default())
    }

    #[tokio::test]
    async fn test_append_then_drain_in_order() {
        let hub = InMemoryBroker::new();
        let queue = queue(&hub).await;
        let player = Uuid::new_v4();

        assert!(queue.append(player, "deposit 50").await);
        assert!(queue.append(player, "deposit 25").await);

        assert_eq!(queue.drain_all(&player).await, vec!["deposit 50", "deposit 25"]);
        assert!(queue.drain_all(&player).await.is_empty());
    }

    #[tokio::test]
    async fn test_queue_visible_from_other_process() {
        let hub = InMemoryBroker::new();
        let proxy = queue(&hub).await;
        let backend = queue(&hub).await;
        let player = Uuid::new_v4();

        proxy.append(player, "you were paid").await;
        assert_eq!(backend.drain_all(&player).await, vec!["you were paid"]);
    }

    #[tokio::test]
    async fn test_key_uses_prefix() {
        let hub = InMemoryBroker::new();
        let queue = queue(&hub).await;
        let player = Uuid::nil();
        assert_eq!(
            queue.key_for(&player),
            "pending_notifications:00000000-0000-0000-0000-000000000000"
        );
    }
}
