//! The capability handed to business logic when the broker is reachable.

use super::pending::PendingNotificationQueue;
use super::requests::{RequestError, RequestTracker};
use super::transfer::{TransferContext, TransferContextTracker};
use crate::broker::Publisher;
use crate::control::ServerControlSignal;
use crate::protocol::{
    ChannelPayload, Envelope, PlayerId, StatusRequest, StatusResponse,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Cross-process operations for the embedding application.
///
/// Obtained from [`CoordinationNode::client`](crate::CoordinationNode::client),
/// which returns `None` while the broker is unreachable. Every method is
/// still safe to call after a later disconnect; publishes become no-ops and
/// requests fail with [`RequestError::NotConnected`].
#[derive(Clone)]
pub struct BrokerClient {
    server_name: Arc<str>,
    publisher: Publisher,
    requests: Arc<RequestTracker>,
    notifications: PendingNotificationQueue,
    transfers: TransferContextTracker,
    request_timeout: Duration,
}

impl BrokerClient {
    pub(crate) fn new(
        server_name: &str,
        publisher: Publisher,
        requests: Arc<RequestTracker>,
        notifications: PendingNotificationQueue,
        transfers: TransferContextTracker,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server_name: Arc::from(server_name),
            publisher,
            requests,
            notifications,
            transfers,
            request_timeout,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    pub async fn publish<P: ChannelPayload>(&self, payload: &P) {
        self.publisher.publish_typed(payload).await;
    }

    pub fn publish_async<P: ChannelPayload>(&self, payload: &P) {
        self.publisher.publish_typed_async(payload);
    }

    pub async fn publish_envelope(&self, channel: &str, envelope: &Envelope) {
        self.publisher.publish(channel, envelope).await;
    }

    /// Publish a request and wait for the response carrying the same
    /// `requestId`. `build` receives the fresh id.
    pub async fn request<Req, Resp, F>(
        &self,
        build: F,
        timeout: Option<Duration>,
    ) -> Result<Resp, RequestError>
    where
        Req: ChannelPayload,
        Resp: DeserializeOwned,
        F: FnOnce(String) -> Req,
    {
        let request = build(uuid::Uuid::new_v4().to_string());
        let envelope = Envelope::from_payload(&request)?;
        let response = self
            .request_envelope(request.channel(), envelope, timeout)
            .await?;
        Ok(response.payload()?)
    }

    /// Untyped form of [`request`](Self::request). Uses the envelope's
    /// `requestId`, adding a fresh one when missing.
    pub async fn request_envelope(
        &self,
        channel: &str,
        mut envelope: Envelope,
        timeout: Option<Duration>,
    ) -> Result<Envelope, RequestError> {
        if !self.publisher.is_connected() {
            return Err(RequestError::NotConnected);
        }

        let request_id = match envelope.request_id() {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                envelope = envelope.with_field("requestId", id.clone());
                id
            }
        };

        let pending = self.requests.register(request_id);
        self.publisher.publish(channel, &envelope).await;
        pending
            .wait(timeout.unwrap_or(self.request_timeout))
            .await
    }

    /// Ask one server (or `all`, first reply wins) for its status.
    pub async fn server_status(&self, server: &str) -> Result<StatusResponse, RequestError> {
        self.request(
            |request_id| StatusRequest {
                request_id,
                server: server.to_string(),
            },
            None,
        )
        .await
    }

    /// Queue a message for a player who is not on this process.
    pub fn notify_offline(&self, player_id: PlayerId, message: impl Into<String>) {
        self.notifications.enqueue(player_id, message);
    }

    pub async fn drain_notifications(&self, player_id: &PlayerId) -> Vec<String> {
        self.notifications.drain_all(player_id).await
    }

    /// Claim the transfer context for a joining player, if one is pending.
    pub fn consume_transfer(&self, player_id: &PlayerId) -> Option<TransferContext> {
        self.transfers.consume(player_id)
    }

    pub fn peek_transfer(&self, player_id: &PlayerId) -> Option<TransferContext> {
        self.transfers.peek(player_id)
    }

    /// Broadcast a restart/shutdown order to the cluster.
    pub async fn issue_control(&self, signal: &ServerControlSignal) {
        self.publisher.publish_typed(&signal.to_message()).await;
    }
}
