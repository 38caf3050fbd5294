//! Routes decoded envelopes to the handlers registered for their channel.

use super::host::HostHandle;
use crate::metrics::CoordinationMetrics;
use crate::protocol::channels::is_known_channel;
use crate::protocol::Envelope;
use dashmap::DashMap;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub type Handler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Where a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Submitted to the host context, in receipt order.
    Host,
    /// Called directly on the subscriber task. Only for handlers that touch
    /// nothing but thread-safe core state.
    Inline,
}

#[derive(Default)]
struct HandlerSet {
    host: Vec<Handler>,
    inline: Vec<Handler>,
}

impl HandlerSet {
    fn push(&mut self, delivery: Delivery, handler: Handler) {
        match delivery {
            Delivery::Host => self.host.push(handler),
            Delivery::Inline => self.inline.push(handler),
        }
    }

    fn extend_into(&self, host: &mut Vec<Handler>, inline: &mut Vec<Handler>) {
        host.extend(self.host.iter().cloned());
        inline.extend(self.inline.iter().cloned());
    }
}

#[derive(Default)]
struct ChannelRoute {
    /// Handlers for every envelope on the channel
    any: HandlerSet,
    /// Handlers for one envelope `type`
    by_kind: HashMap<String, HandlerSet>,
}

pub struct MessageRouter {
    routes: DashMap<String, ChannelRoute>,
    host: HostHandle,
    metrics: Arc<CoordinationMetrics>,
}

impl MessageRouter {
    pub fn new(host: HostHandle, metrics: Arc<CoordinationMetrics>) -> Self {
        Self {
            routes: DashMap::new(),
            host,
            metrics,
        }
    }

    /// Register a host-context handler for `channel`, optionally narrowed to
    /// one envelope `type`.
    pub fn register<F>(&self, channel: &str, kind: Option<&str>, handler: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        self.register_with(channel, kind, Delivery::Host, handler);
    }

    pub fn register_with<F>(&self, channel: &str, kind: Option<&str>, delivery: Delivery, handler: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        if !is_known_channel(channel) {
            warn!(channel, "Registering handler on a channel outside the cluster channel table");
        }
        let handler: Handler = Arc::new(handler);
        let mut route = self.routes.entry(channel.to_string()).or_default();
        match kind {
            Some(kind) => route
                .by_kind
                .entry(kind.to_string())
                .or_default()
                .push(delivery, handler),
            None => route.any.push(delivery, handler),
        }
        debug!(channel, kind = kind.unwrap_or("*"), ?delivery, "Registered handler");
    }

    /// Deliver one envelope. Returns the number of handlers it reached; zero
    /// means it was unroutable and has been dropped.
    pub fn dispatch(&self, channel: &str, envelope: Envelope) -> usize {
        let mut host = Vec::new();
        let mut inline = Vec::new();
        if let Some(route) = self.routes.get(channel) {
            route.any.extend_into(&mut host, &mut inline);
            if let Some(set) = route.by_kind.get(&envelope.kind) {
                set.extend_into(&mut host, &mut inline);
            }
        }

        let total = host.len() + inline.len();
        if total == 0 {
            self.metrics.increment_unroutable();
            debug!(channel, kind = %envelope.kind, "No handler for envelope; dropped");
            return 0;
        }

        for handler in &inline {
            let copy = envelope.clone();
            if catch_unwind(AssertUnwindSafe(|| handler(copy))).is_err() {
                self.metrics.increment_handler_panics();
                error!(channel, kind = %envelope.kind, "Inline handler panicked");
            }
        }

        if !host.is_empty() {
            let submitted = self.host.submit(move || {
                for handler in &host {
                    handler(envelope.clone());
                }
            });
            if !submitted {
                warn!(channel, "Host context closed; handlers skipped");
            }
        }

        self.metrics.add_handlers_dispatched(total as u64);
        total
    }

    /// Every channel with at least one handler, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.routes.iter().map(|r| r.key().clone()).collect();
        channels.sort();
        channels
    }
}
