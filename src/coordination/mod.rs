//! Cross-process coordination built on the broker
//!
//! This module provides:
//! - The host execution context that handlers and countdown steps run on
//! - Channel routing from decoded envelopes to handlers
//! - Transfer-context and pending-notification caches
//! - Request/response correlation and the `BrokerClient` capability

// Public modules
pub mod client;
pub mod host;
pub mod pending;
pub mod requests;
pub mod router;
pub mod transfer;

// Re-export public types
pub use client::BrokerClient;
pub use host::{host_context, HostHandle, HostJob, HostQueue};
pub use pending::PendingNotificationQueue;
pub use requests::{PendingRequest, RequestError, RequestTracker};
pub use router::{Delivery, Handler, MessageRouter};
pub use transfer::{TransferContext, TransferContextTracker};
