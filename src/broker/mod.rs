//! Broker transport, connection lifecycle, and the publish/subscribe engine
//!
//! # Features
//!
//! - `redis` (default): Redis transport with pooled publishes
//! - the in-memory hub is always available for tests and single-process use

pub mod connection;
pub mod error;
pub mod memory;
pub mod publisher;
#[cfg(feature = "redis")]
pub mod redis;
pub mod subscriber;
pub mod transport;

pub use connection::BrokerConnection;
pub use error::BrokerError;
pub use memory::InMemoryBroker;
pub use publisher::Publisher;
#[cfg(feature = "redis")]
pub use self::redis::RedisTransport;
pub use subscriber::Subscriber;
pub use transport::{BrokerTransport, InboundMessage, MessageStream, PoolStatus, PublishReceipt};
