use super::connection::BrokerConnection;
use crate::protocol::{ChannelPayload, Envelope};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outbound side of the broker. At-most-once, no acknowledgement; failures
/// are logged and counted, never returned.
#[derive(Clone)]
pub struct Publisher {
    connection: Arc<BrokerConnection>,
}

impl Publisher {
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self { connection }
    }

    /// Publish on the caller's task.
    pub async fn publish(&self, channel: &str, envelope: &Envelope) {
        match envelope.encode() {
            Ok(payload) => self.publish_payload(channel, &payload).await,
            Err(e) => {
                self.connection.metrics().increment_publish_failures();
                warn!(channel, error = %e, "Failed to encode envelope");
            }
        }
    }

    /// Publish from a spawned task and return immediately.
    pub fn publish_async(&self, channel: impl Into<String>, envelope: Envelope) {
        let channel = channel.into();
        let publisher = self.clone();
        self.spawn(async move { publisher.publish(&channel, &envelope).await });
    }

    /// Wrap a typed payload in an envelope and publish it on its channel.
    pub async fn publish_typed<P: ChannelPayload>(&self, payload: &P) {
        match Envelope::from_payload(payload) {
            Ok(envelope) => self.publish(payload.channel(), &envelope).await,
            Err(e) => {
                self.connection.metrics().increment_publish_failures();
                warn!(channel = payload.channel(), error = %e, "Failed to encode payload");
            }
        }
    }

    pub fn publish_typed_async<P: ChannelPayload>(&self, payload: &P) {
        match Envelope::from_payload(payload) {
            Ok(envelope) => self.publish_async(payload.channel(), envelope),
            Err(e) => {
                self.connection.metrics().increment_publish_failures();
                warn!(channel = payload.channel(), error = %e, "Failed to encode payload");
            }
        }
    }

    /// Publish an already-encoded payload.
    pub async fn publish_payload(&self, channel: &str, payload: &str) {
        let metrics = self.connection.metrics();
        let Some(transport) = self.connection.transport() else {
            metrics.increment_publish_skipped();
            debug!(channel, "Broker disconnected; publish skipped");
            return;
        };

        match transport.publish(channel, payload).await {
            Ok(receipt) => {
                metrics.increment_messages_published();
                let threshold = self.connection.settings().slow_acquire_threshold();
                if receipt.acquire_wait > threshold {
                    metrics.increment_slow_pool_acquires();
                    warn!(
                        channel,
                        wait_ms = receipt.acquire_wait.as_millis(),
                        threshold_ms = threshold.as_millis(),
                        "Slow broker pool acquisition"
                    );
                }
                debug!(channel, receivers = receipt.receivers, "Published message");
            }
            Err(e) => {
                metrics.increment_publish_failures();
                warn!(channel, error = %e, "Publish failed; message dropped");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if !self.connection.is_connected() {
            self.connection.metrics().increment_publish_skipped();
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(task);
            }
            Err(_) => {
                self.connection.metrics().increment_publish_failures();
                warn!("No tokio runtime available; async publish dropped");
            }
        }
    }
}
