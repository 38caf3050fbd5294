//! In-memory broker hub backed by `tokio::sync::broadcast`.
//!
//! Every handle created from the same hub sees the same channels and lists,
//! so several nodes in one process behave like a cluster sharing a broker.
//! Outages can be simulated with [`InMemoryBroker::set_available`].

use super::error::BrokerError;
use super::transport::{BrokerTransport, InboundMessage, MessageStream, PublishReceipt};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default buffer size for broadcast channels
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Minimum time between sweeps of expired lists
const LIST_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct StoredList {
    items: Vec<String>,
    expires_at: Instant,
}

/// Keyed lists with per-key expiry. Expired keys nobody drains are swept
/// on a later append.
struct ListStore {
    entries: HashMap<String, StoredList>,
    next_sweep: Instant,
}

impl ListStore {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_sweep: Instant::now() + LIST_SWEEP_INTERVAL,
        }
    }

    fn sweep_expired(&mut self, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        self.entries.retain(|_, list| list.expires_at > now);
        self.next_sweep = now + LIST_SWEEP_INTERVAL;
    }
}

struct Hub {
    channels: DashMap<String, broadcast::Sender<InboundMessage>>,
    lists: Mutex<ListStore>,
    available: watch::Sender<bool>,
    buffer_size: usize,
}

/// A handle onto a shared in-memory broker.
///
/// `close()` only affects this handle; other handles on the same hub keep
/// working.
pub struct InMemoryBroker {
    hub: Arc<Hub>,
    closed: CancellationToken,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (available, _) = watch::channel(true);
        Self {
            hub: Arc::new(Hub {
                channels: DashMap::new(),
                lists: Mutex::new(ListStore::new()),
                available,
                buffer_size: buffer_size.max(1),
            }),
            closed: CancellationToken::new(),
        }
    }

    /// A fresh handle onto the same hub, with its own open/closed state.
    pub fn handle(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            closed: CancellationToken::new(),
        }
    }

    /// Simulate the broker going down or coming back. Going down ends every
    /// live subscription stream on every handle.
    pub fn set_available(&self, available: bool) {
        self.hub.available.send_replace(available);
    }

    pub fn is_available(&self) -> bool {
        *self.hub.available.borrow()
    }

    /// Number of live subscriptions on `channel` across all handles.
    pub fn receiver_count(&self, channel: &str) -> usize {
        self.hub
            .channels
            .get(channel)
            .map_or(0, |tx| tx.receiver_count())
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<InboundMessage> {
        self.hub
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.hub.buffer_size).0)
            .clone()
    }

    fn check_usable(&self) -> Result<(), BrokerError> {
        if self.closed.is_cancelled() {
            return Err(BrokerError::Closed);
        }
        if !self.is_available() {
            return Err(BrokerError::Unavailable(
                "in-memory broker marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn receiver_stream(
    channel: String,
    rx: broadcast::Receiver<InboundMessage>,
) -> stream::BoxStream<'static, InboundMessage> {
    stream::unfold((channel, rx), |(channel, mut rx)| async move {
        loop {
            match rx.recv().await {
                Ok(message) => return Some((message, (channel, rx))),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(channel = %channel, skipped, "Subscriber lagged, messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[async_trait]
impl BrokerTransport for InMemoryBroker {
    async fn ping(&self) -> Result<(), BrokerError> {
        self.check_usable()
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<PublishReceipt, BrokerError> {
        self.check_usable()?;

        let message = InboundMessage {
            channel: channel.to_string(),
            payload: payload.to_string(),
        };
        // send() only fails when nobody is subscribed
        let receivers = self.sender(channel).send(message).unwrap_or(0);

        Ok(PublishReceipt {
            acquire_wait: Duration::ZERO,
            receivers,
        })
    }

    async fn subscribe(&self, channels: &[String]) -> Result<MessageStream, BrokerError> {
        self.check_usable()?;

        let merged = stream::select_all(
            channels
                .iter()
                .map(|channel| receiver_stream(channel.clone(), self.sender(channel).subscribe())),
        );

        let closed = self.closed.clone();
        let mut availability = self.hub.available.subscribe();
        let outage = async move {
            loop {
                if !*availability.borrow_and_update() {
                    break;
                }
                if availability.changed().await.is_err() {
                    break;
                }
            }
        };
        let ended = async move {
            tokio::select! {
                () = closed.cancelled() => {}
                () = outage => {}
            }
        };

        Ok(Box::pin(merged.take_until(ended)))
    }

    async fn append_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), BrokerError> {
        self.check_usable()?;

        let now = Instant::now();
        let mut lists = self.hub.lists.lock().await;
        lists.sweep_expired(now);
        let entry = lists.entries.entry(key.to_string()).or_insert_with(|| StoredList {
            items: Vec::new(),
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.items.clear();
        }
        entry.items.push(value.to_string());
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn drain_list(&self, key: &str) -> Result<Vec<String>, BrokerError> {
        self.check_usable()?;

        let mut lists = self.hub.lists.lock().await;
        Ok(match lists.entries.remove(key) {
            Some(list) if list.expires_at > Instant::now() => list.items,
            _ => Vec::new(),
        })
    }

    async fn close(&self) {
        self.closed.cancel();
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
