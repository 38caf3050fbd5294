use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one coordination node.
#[derive(Debug)]
pub struct CoordinationMetrics {
    // Broker connection
    pub connect_attempts: AtomicU64,
    pub connect_failures: AtomicU64,
    pub retry_attempts: AtomicU64,
    pub retry_successes: AtomicU64,

    // Outbound
    pub messages_published: AtomicU64,
    pub publish_failures: AtomicU64,
    pub publish_skipped_disconnected: AtomicU64,
    pub slow_pool_acquires: AtomicU64,

    // Inbound
    pub messages_received: AtomicU64,
    pub decode_failures: AtomicU64,
    pub unroutable_messages: AtomicU64,
    pub handlers_dispatched: AtomicU64,
    pub handler_panics: AtomicU64,
    pub subscriber_reconnects: AtomicU64,

    // Transfer context
    pub transfers_recorded: AtomicU64,
    pub transfers_consumed: AtomicU64,
    pub transfers_expired: AtomicU64,

    // Pending notifications
    pub notifications_enqueued: AtomicU64,
    pub notifications_drained: AtomicU64,

    // Request/response
    pub requests_issued: AtomicU64,
    pub requests_resolved: AtomicU64,
    pub requests_timed_out: AtomicU64,

    // Server control
    pub control_signals_applied: AtomicU64,
    pub control_signals_ignored: AtomicU64,
    pub countdown_tasks_cancelled: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub connection: ConnectionMetrics,
    pub publish: PublishMetrics,
    pub subscribe: SubscribeMetrics,
    pub transfers: TransferMetrics,
    pub notifications: NotificationMetrics,
    pub requests: RequestMetrics,
    pub control: ControlMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionMetrics {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PublishMetrics {
    pub messages_published: u64,
    pub publish_failures: u64,
    pub publish_skipped_disconnected: u64,
    pub slow_pool_acquires: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubscribeMetrics {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub unroutable_messages: u64,
    pub handlers_dispatched: u64,
    pub handler_panics: u64,
    pub subscriber_reconnects: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransferMetrics {
    pub recorded: u64,
    pub consumed: u64,
    pub expired: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationMetrics {
    pub enqueued: u64,
    pub drained: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestMetrics {
    pub issued: u64,
    pub resolved: u64,
    pub timed_out: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControlMetrics {
    pub signals_applied: u64,
    pub signals_ignored: u64,
    pub countdown_tasks_cancelled: u64,
}

impl Default for CoordinationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationMetrics {
    pub fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            retry_attempts: AtomicU64::new(0),
            retry_successes: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            publish_skipped_disconnected: AtomicU64::new(0),
            slow_pool_acquires: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            unroutable_messages: AtomicU64::new(0),
            handlers_dispatched: AtomicU64::new(0),
            handler_panics: AtomicU64::new(0),
            subscriber_reconnects: AtomicU64::new(0),
            transfers_recorded: AtomicU64::new(0),
            transfers_consumed: AtomicU64::new(0),
            transfers_expired: AtomicU64::new(0),
            notifications_enqueued: AtomicU64::new(0),
            notifications_drained: AtomicU64::new(0),
            requests_issued: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            requests_timed_out: AtomicU64::new(0),
            control_signals_applied: AtomicU64::new(0),
            control_signals_ignored: AtomicU64::new(0),
            countdown_tasks_cancelled: AtomicU64::new(0),
        }
    }

    // Broker connection
    pub fn increment_connect_attempts(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_connect_failures(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_attempts(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retry_successes(&self) {
        self.retry_successes.fetch_add(1, Ordering::Relaxed);
    }

    // Outbound
    pub fn increment_messages_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_skipped(&self) {
        self.publish_skipped_disconnected
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_slow_pool_acquires(&self) {
        self.slow_pool_acquires.fetch_add(1, Ordering::Relaxed);
    }

    // Inbound
    pub fn increment_messages_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unroutable(&self) {
        self.unroutable_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_handler_panics(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_handlers_dispatched(&self, count: u64) {
        if count > 0 {
            self.handlers_dispatched.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn increment_subscriber_reconnects(&self) {
        self.subscriber_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    // Transfer context
    pub fn increment_transfers_recorded(&self) {
        self.transfers_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transfers_consumed(&self) {
        self.transfers_consumed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transfers_expired(&self) {
        self.transfers_expired.fetch_add(1, Ordering::Relaxed);
    }

    // Pending notifications
    pub fn increment_notifications_enqueued(&self) {
        self.notifications_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_notifications_drained(&self, count: u64) {
        if count > 0 {
            self.notifications_drained
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    // Request/response
    pub fn increment_requests_issued(&self) {
        self.requests_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_resolved(&self) {
        self.requests_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_requests_timed_out(&self) {
        self.requests_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    // Server control
    pub fn increment_control_signals_applied(&self) {
        self.control_signals_applied
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_control_signals_ignored(&self) {
        self.control_signals_ignored
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_countdown_tasks_cancelled(&self, count: u64) {
        if count > 0 {
            self.countdown_tasks_cancelled
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            connection: ConnectionMetrics {
                connect_attempts: load(&self.connect_attempts),
                connect_failures: load(&self.connect_failures),
                retry_attempts: load(&self.retry_attempts),
                retry_successes: load(&self.retry_successes),
            },
            publish: PublishMetrics {
                messages_published: load(&self.messages_published),
                publish_failures: load(&self.publish_failures),
                publish_skipped_disconnected: load(&self.publish_skipped_disconnected),
                slow_pool_acquires: load(&self.slow_pool_acquires),
            },
            subscribe: SubscribeMetrics {
                messages_received: load(&self.messages_received),
                decode_failures: load(&self.decode_failures),
                unroutable_messages: load(&self.unroutable_messages),
                handlers_dispatched: load(&self.handlers_dispatched),
                handler_panics: load(&self.handler_panics),
                subscriber_reconnects: load(&self.subscriber_reconnects),
            },
            transfers: TransferMetrics {
                recorded: load(&self.transfers_recorded),
                consumed: load(&self.transfers_consumed),
                expired: load(&self.transfers_expired),
            },
            notifications: NotificationMetrics {
                enqueued: load(&self.notifications_enqueued),
                drained: load(&self.notifications_drained),
            },
            requests: RequestMetrics {
                issued: load(&self.requests_issued),
                resolved: load(&self.requests_resolved),
                timed_out: load(&self.requests_timed_out),
            },
            control: ControlMetrics {
                signals_applied: load(&self.control_signals_applied),
                signals_ignored: load(&self.control_signals_ignored),
                countdown_tasks_cancelled: load(&self.countdown_tasks_cancelled),
            },
        }
    }
}
