//! One process's coordination root.

use crate::broker::{BrokerConnection, BrokerError, BrokerTransport, Publisher, Subscriber};
use crate::config::Config;
use crate::control::{ServerControlCoordinator, ServerControlSignal, ServerHost};
use crate::coordination::{
    BrokerClient, Delivery, HostHandle, MessageRouter, PendingNotificationQueue, RequestTracker,
    TransferContextTracker,
};
use crate::metrics::CoordinationMetrics;
use crate::protocol::channels::{self, TARGET_ALL};
use crate::protocol::{Envelope, PlayerSwitch, ServerControlMessage, StatusRequest, StatusResponse};
use std::sync::Arc;
use tracing::{info, warn};

/// Owns every coordination component for one process.
///
/// Created once by the application root; nothing here is global, so several
/// nodes can share a process (and an in-memory broker) in tests. Handlers
/// must be registered on [`router`](Self::router) before [`start`](Self::start),
/// since the subscription's channel set is fixed when the loop starts.
pub struct CoordinationNode {
    server_name: String,
    connection: Arc<BrokerConnection>,
    publisher: Publisher,
    subscriber: Subscriber,
    router: Arc<MessageRouter>,
    transfers: TransferContextTracker,
    notifications: PendingNotificationQueue,
    requests: Arc<RequestTracker>,
    coordinator: ServerControlCoordinator,
    metrics: Arc<CoordinationMetrics>,
    request_timeout: std::time::Duration,
}

impl CoordinationNode {
    /// Build a node around an explicit transport.
    pub fn new(
        config: &Config,
        transport: Arc<dyn BrokerTransport>,
        host: HostHandle,
        server: Arc<dyn ServerHost>,
    ) -> Self {
        let metrics = Arc::new(CoordinationMetrics::new());
        let connection = Arc::new(BrokerConnection::new(
            transport,
            config.broker.clone(),
            Arc::clone(&metrics),
        ));
        Self::assemble(config, connection, host, server, metrics)
    }

    /// Build a node with the transport named by `config.broker.backend`.
    pub fn from_config(
        config: &Config,
        host: HostHandle,
        server: Arc<dyn ServerHost>,
    ) -> Result<Self, BrokerError> {
        let metrics = Arc::new(CoordinationMetrics::new());
        let connection = Arc::new(BrokerConnection::from_config(
            &config.broker,
            Arc::clone(&metrics),
        )?);
        Ok(Self::assemble(config, connection, host, server, metrics))
    }

    fn assemble(
        config: &Config,
        connection: Arc<BrokerConnection>,
        host: HostHandle,
        server: Arc<dyn ServerHost>,
        metrics: Arc<CoordinationMetrics>,
    ) -> Self {
        let server_name = config.server_name.clone();
        let publisher = Publisher::new(Arc::clone(&connection));
        let router = Arc::new(MessageRouter::new(host.clone(), Arc::clone(&metrics)));
        let transfers =
            TransferContextTracker::new(&server_name, config.transfer.ttl(), Arc::clone(&metrics));
        let notifications =
            PendingNotificationQueue::new(Arc::clone(&connection), &config.notifications);
        let requests = Arc::new(RequestTracker::new(Arc::clone(&metrics)));
        let coordinator = ServerControlCoordinator::new(
            &server_name,
            config.control.clone(),
            host,
            Arc::clone(&server),
            Arc::clone(&metrics),
        );

        let node = Self {
            server_name,
            subscriber: Subscriber::new(Arc::clone(&connection)),
            connection,
            publisher,
            router,
            transfers,
            notifications,
            requests,
            coordinator,
            metrics,
            request_timeout: config.broker.request_timeout(),
        };
        node.register_builtin_handlers(server);
        node
    }

    fn register_builtin_handlers(&self, server: Arc<dyn ServerHost>) {
        let transfers = self.transfers.clone();
        let metrics = Arc::clone(&self.metrics);
        self.router.register_with(
            channels::PLAYER_SWITCH,
            Some("switch"),
            Delivery::Inline,
            move |envelope| match envelope.payload::<PlayerSwitch>() {
                Ok(switch) => {
                    transfers.record(&switch);
                }
                Err(e) => {
                    metrics.increment_decode_failures();
                    warn!(error = %e, "Invalid player.switch payload");
                }
            },
        );

        let coordinator = self.coordinator.clone();
        let metrics = Arc::clone(&self.metrics);
        self.router.register_with(
            channels::SERVER_CONTROL,
            None,
            Delivery::Inline,
            move |envelope| match envelope.payload::<ServerControlMessage>() {
                Ok(message) => {
                    coordinator.handle_signal(ServerControlSignal::from(message));
                }
                Err(e) => {
                    metrics.increment_decode_failures();
                    warn!(error = %e, "Invalid server.control payload");
                }
            },
        );

        let publisher = self.publisher.clone();
        let self_name = self.server_name.clone();
        let metrics = Arc::clone(&self.metrics);
        self.router.register(channels::STATUS_REQUEST, None, move |envelope| {
            let request = match envelope.payload::<StatusRequest>() {
                Ok(request) => request,
                Err(e) => {
                    metrics.increment_decode_failures();
                    warn!(error = %e, "Invalid status.request payload");
                    return;
                }
            };
            if request.server != self_name && !request.server.eq_ignore_ascii_case(TARGET_ALL) {
                return;
            }
            let status = server.status();
            publisher.publish_typed_async(&StatusResponse {
                request_id: request.request_id,
                server: self_name.clone(),
                online: status.online,
                player_count: status.player_count,
                max_players: status.max_players,
                tps: status.tps,
            });
        });

        for channel in channels::RESPONSE_CHANNELS {
            let requests = Arc::clone(&self.requests);
            self.router
                .register_with(channel, None, Delivery::Inline, move |envelope: Envelope| {
                    requests.resolve(&envelope);
                });
        }
    }

    /// Connect and start listening. Returns whether the node is live; a
    /// false return means degraded mode, not an error.
    pub async fn start(&self) -> bool {
        if self.connection.connect().await.is_err() {
            return false;
        }
        let channels = self.router.channels();
        let started = self
            .subscriber
            .start(channels.clone(), Arc::clone(&self.router))
            .await;
        if started {
            info!(
                server = %self.server_name,
                channels = channels.len(),
                "Coordination node started"
            );
        }
        started
    }

    /// Stop listening, abort any countdown, and release the broker.
    pub async fn stop(&self) {
        self.subscriber.stop().await;
        self.coordinator.cancel();
        self.connection.disconnect().await;
        info!(server = %self.server_name, "Coordination node stopped");
    }

    /// The capability for business logic; `None` while disconnected.
    pub fn client(&self) -> Option<BrokerClient> {
        self.connection.is_connected().then(|| {
            BrokerClient::new(
                &self.server_name,
                self.publisher.clone(),
                Arc::clone(&self.requests),
                self.notifications.clone(),
                self.transfers.clone(),
                self.request_timeout,
            )
        })
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn subscriber(&self) -> &Subscriber {
        &self.subscriber
    }

    pub fn transfers(&self) -> &TransferContextTracker {
        &self.transfers
    }

    pub fn notifications(&self) -> &PendingNotificationQueue {
        &self.notifications
    }

    pub fn coordinator(&self) -> &ServerControlCoordinator {
        &self.coordinator
    }

    pub fn connection(&self) -> &Arc<BrokerConnection> {
        &self.connection
    }

    pub fn metrics(&self) -> &Arc<CoordinationMetrics> {
        &self.metrics
    }
}
