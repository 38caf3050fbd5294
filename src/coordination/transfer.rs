//! Short-lived record of players being handed off to this process.

use crate::metrics::CoordinationMetrics;
use crate::protocol::{PlayerId, PlayerSwitch};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A player known to be mid-transfer into this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferContext {
    pub player_id: PlayerId,
    pub player_name: String,
    pub from_server: String,
    pub to_server: String,
    /// Switch timestamp from the announcing process (epoch milliseconds)
    pub created_at: i64,
}

struct Entry {
    context: TransferContext,
    generation: u64,
    inserted_at: Instant,
}

/// TTL cache of [`TransferContext`]s keyed by player.
///
/// Every insert schedules its own removal. A removal timer only fires for the
/// exact entry it was created with, so a newer switch for the same player is
/// never evicted by an older timer.
#[derive(Clone)]
pub struct TransferContextTracker {
    self_name: Arc<str>,
    ttl: Duration,
    entries: Arc<DashMap<PlayerId, Entry>>,
    generation: Arc<AtomicU64>,
    metrics: Arc<CoordinationMetrics>,
}

impl TransferContextTracker {
    pub fn new(self_name: &str, ttl: Duration, metrics: Arc<CoordinationMetrics>) -> Self {
        Self {
            self_name: Arc::from(self_name),
            ttl,
            entries: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
            metrics,
        }
    }

    /// Record a switch. Ignored unless `to` names this process.
    pub fn record_switch(
        &self,
        player_id: PlayerId,
        player_name: &str,
        from: &str,
        to: &str,
        timestamp: i64,
    ) -> bool {
        if to != &*self.self_name {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.insert(
            player_id,
            Entry {
                context: TransferContext {
                    player_id,
                    player_name: player_name.to_string(),
                    from_server: from.to_string(),
                    to_server: to.to_string(),
                    created_at: timestamp,
                },
                generation,
                inserted_at: Instant::now(),
            },
        );
        self.metrics.increment_transfers_recorded();
        debug!(player = %player_id, from, to, "Recorded inbound transfer");

        self.schedule_expiry(player_id, generation);
        true
    }

    pub fn record(&self, switch: &PlayerSwitch) -> bool {
        self.record_switch(
            switch.uuid,
            &switch.player,
            &switch.from,
            &switch.to,
            switch.timestamp,
        )
    }

    pub fn peek(&self, player_id: &PlayerId) -> Option<TransferContext> {
        let entry = self.entries.get(player_id)?;
        if entry.inserted_at.elapsed() < self.ttl {
            return Some(entry.context.clone());
        }
        let generation = entry.generation;
        drop(entry);
        self.expire(*player_id, generation);
        None
    }

    /// Remove and return the context in one step.
    pub fn consume(&self, player_id: &PlayerId) -> Option<TransferContext> {
        let (_, entry) = self.entries.remove(player_id)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            self.metrics.increment_transfers_expired();
            return None;
        }
        self.metrics.increment_transfers_consumed();
        Some(entry.context)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn schedule_expiry(&self, player_id: PlayerId, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let tracker = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(tracker.ttl).await;
            tracker.expire(player_id, generation);
        });
    }

    fn expire(&self, player_id: PlayerId, generation: u64) {
        if self
            .entries
            .remove_if(&player_id, |_, entry| entry.generation == generation)
            .is_some()
        {
            self.metrics.increment_transfers_expired();
            debug!(player = %player_id, "Transfer context expired");
        }
    }
}
