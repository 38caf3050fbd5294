#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Cluster Bridge
//!
//! Cross-process coordination for a proxy/backend game server cluster.
//!
//! Every process connects to one shared pub/sub broker, relays typed JSON
//! envelopes over named channels, and runs coordinated restart/shutdown
//! countdowns. When the broker is unreachable the process keeps running
//! with cross-process features disabled.

/// Broker transport, pooled publishing and the subscriber loop
pub mod broker;

/// Configuration loading and validation
pub mod config;

/// Coordinated restart and shutdown countdowns
pub mod control;

/// Host context, routing, transfer tracking, notifications and requests
pub mod coordination;

/// Structured logging configuration
pub mod logging;

/// Coordination counters and snapshots
pub mod metrics;

/// The per-process coordination root
pub mod node;

/// Channel names, the wire envelope, and typed payloads
pub mod protocol;

/// Retry logic utilities
pub mod retry;

pub use node::CoordinationNode;
