use super::error::BrokerError;
use super::memory::InMemoryBroker;
use super::transport::{BrokerTransport, PoolStatus};
use crate::config::{BrokerBackend, BrokerConfig};
use crate::metrics::CoordinationMetrics;
use crate::retry::{RetryConfig, RetryExecutor};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the broker transport and the process-wide liveness flag.
///
/// A failed [`connect`](Self::connect) is soft: the transport is closed, the
/// flag stays false, and every component built on this connection degrades to
/// a no-op instead of erroring.
pub struct BrokerConnection {
    transport: Arc<dyn BrokerTransport>,
    settings: BrokerConfig,
    metrics: Arc<CoordinationMetrics>,
    connected: AtomicBool,
}

impl BrokerConnection {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        settings: BrokerConfig,
        metrics: Arc<CoordinationMetrics>,
    ) -> Self {
        Self {
            transport,
            settings,
            metrics,
            connected: AtomicBool::new(false),
        }
    }

    /// Build the configured backend. Does not touch the network.
    ///
    /// The memory backend gets a private hub; share one across nodes with
    /// [`BrokerConnection::new`] and [`InMemoryBroker::handle`] instead.
    pub fn from_config(
        settings: &BrokerConfig,
        metrics: Arc<CoordinationMetrics>,
    ) -> Result<Self, BrokerError> {
        let transport: Arc<dyn BrokerTransport> = match settings.backend {
            BrokerBackend::Memory => Arc::new(InMemoryBroker::new()),
            #[cfg(feature = "redis")]
            BrokerBackend::Redis => Arc::new(super::redis::RedisTransport::new(settings)?),
            #[cfg(not(feature = "redis"))]
            BrokerBackend::Redis => {
                return Err(BrokerError::Unavailable(
                    "built without the `redis` feature".to_string(),
                ))
            }
        };
        Ok(Self::new(transport, settings.clone(), metrics))
    }

    /// Probe the broker, retrying transient failures with backoff. Each
    /// attempt is bounded by `connect_timeout`.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        if self.is_connected() {
            return Ok(());
        }

        let executor = RetryExecutor::with_metrics(
            RetryConfig::connect(self.settings.connect_attempts),
            Arc::clone(&self.metrics),
        );
        let timeout = self.settings.connect_timeout();

        let ping = executor
            .execute("broker_connect", || async {
                self.metrics.increment_connect_attempts();
                tokio::time::timeout(timeout, self.transport.ping())
                    .await
                    .unwrap_or_else(|_| {
                        Err(BrokerError::Unavailable(format!(
                            "liveness check timed out after {}ms",
                            timeout.as_millis()
                        )))
                    })
            })
            .await;

        match ping {
            Ok(()) => {
                self.connected.store(true, Ordering::Release);
                info!(
                    transport = self.transport.name(),
                    "Connected to broker"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.increment_connect_failures();
                self.transport.close().await;
                warn!(
                    transport = self.transport.name(),
                    error = %e,
                    "Broker unreachable; cross-process features disabled"
                );
                Err(e)
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Mark the connection dead and release every pooled connection.
    pub async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.transport.close().await;
            info!(transport = self.transport.name(), "Disconnected from broker");
        }
    }

    /// The live transport, or `None` in degraded mode.
    pub fn transport(&self) -> Option<Arc<dyn BrokerTransport>> {
        self.is_connected().then(|| Arc::clone(&self.transport))
    }

    pub fn settings(&self) -> &BrokerConfig {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<CoordinationMetrics> {
        &self.metrics
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.transport.pool_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn memory_settings() -> BrokerConfig {
        BrokerConfig {
            backend: BrokerBackend::Memory,
            connect_attempts: 2,
            connect_timeout_ms: 50,
            ..BrokerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let metrics = Arc::new(CoordinationMetrics::new());
        let connection = BrokerConnection::from_config(&memory_settings(), metrics).unwrap();

        assert!(!connection.is_connected());
        assert!(connection.transport().is_none());

        connection.connect().await.unwrap();
        assert!(connection.is_connected());
        assert!(connection.transport().is_some());

        connection.disconnect().await;
        assert!(!connection.is_connected());
        assert!(connection.transport().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ping_is_soft() {
        let hub = InMemoryBroker::new();
        hub.set_available(false);
        let metrics = Arc::new(CoordinationMetrics::new());
        let connection = BrokerConnection::new(
            Arc::new(hub.handle()),
            memory_settings(),
            Arc::clone(&metrics),
        );

        let started = tokio::time::Instant::now();
        assert!(connection.connect().await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!connection.is_connected());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connection.connect_attempts, 2);
        assert_eq!(snapshot.connection.connect_failures, 1);

        // The transport was released, so recovery needs a fresh connection.
        hub.set_available(true);
        assert!(connection.connect().await.is_err());
    }
}
