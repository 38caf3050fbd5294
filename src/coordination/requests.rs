//! Correlation table for request/response channel pairs.

use crate::metrics::CoordinationMetrics;
use crate::protocol::{DecodeError, Envelope};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("broker not connected")]
    NotConnected,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("request cancelled before a response arrived")]
    Cancelled,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Outstanding requests keyed by `requestId`.
pub struct RequestTracker {
    pending: DashMap<String, oneshot::Sender<Envelope>>,
    metrics: Arc<CoordinationMetrics>,
}

/// A registered request waiting for its response. Dropping it, awaited or
/// not, removes its table entry.
pub struct PendingRequest<'a> {
    tracker: &'a RequestTracker,
    request_id: String,
    rx: oneshot::Receiver<Envelope>,
}

impl RequestTracker {
    pub fn new(metrics: Arc<CoordinationMetrics>) -> Self {
        Self {
            pending: DashMap::new(),
            metrics,
        }
    }

    pub fn register(&self, request_id: impl Into<String>) -> PendingRequest<'_> {
        let request_id = request_id.into();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        self.metrics.increment_requests_issued();
        PendingRequest {
            tracker: self,
            request_id,
            rx,
        }
    }

    /// Complete the request named by the envelope's `requestId`. Returns
    /// false for unknown, late or duplicate responses.
    pub fn resolve(&self, envelope: &Envelope) -> bool {
        let Some(request_id) = envelope.request_id() else {
            debug!(kind = %envelope.kind, "Response without requestId ignored");
            return false;
        };
        let Some((_, tx)) = self.pending.remove(request_id) else {
            debug!(request_id, "No pending request for response");
            return false;
        };
        if tx.send(envelope.clone()).is_ok() {
            self.metrics.increment_requests_resolved();
            true
        } else {
            false
        }
    }

    pub fn cancel(&self, request_id: &str) -> bool {
        self.pending.remove(request_id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl PendingRequest<'_> {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the response.
    pub async fn wait(mut self, timeout: Duration) -> Result<Envelope, RequestError> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(RequestError::Cancelled),
            Err(_) => {
                self.tracker.metrics.increment_requests_timed_out();
                Err(RequestError::Timeout(timeout))
            }
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.tracker.pending.remove(&self.request_id);
    }
}
