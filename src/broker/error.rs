use thiserror::Error;

/// Failures surfaced by a broker transport.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not be reached or refused the operation.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// No live connection; the node is running in degraded mode.
    #[error("broker not connected")]
    NotConnected,

    /// Borrowing a pooled connection exceeded the configured wait.
    #[error("timed out waiting for a pooled broker connection")]
    PoolTimeout,

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("broker i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport was closed by `disconnect`.
    #[error("broker transport closed")]
    Closed,

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

impl BrokerError {
    /// Whether retrying the same operation later could succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::PoolTimeout | Self::Pool(_) | Self::Io(_)
        )
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Pool(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BrokerError::Unavailable("refused".into()).is_transient());
        assert!(BrokerError::PoolTimeout.is_transient());
        assert!(!BrokerError::NotConnected.is_transient());
        assert!(!BrokerError::Closed.is_transient());
    }
}
