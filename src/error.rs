//! Confsync error types.
//!
//! The taxonomy mirrors the retry structure of the push engine: transient
//! conditions (`Connect`, `NotStable`, `VersionConflict`) are absorbed by
//! the retry loop that owns them and only surface once a budget or deadline
//! is exhausted, while everything else propagates immediately and aborts
//! the remaining snapshots.

use thiserror::Error;

use crate::protocol::CapabilitySet;

/// Confsync errors.
#[derive(Error, Debug)]
pub enum ConfsyncError {
    /// Transport refused, unreachable or timed out during session open.
    ///
    /// Retried by the capability poller, never by the RPC layer.
    #[error("Connect error: {0}")]
    Connect(String),

    /// The peer accepted the transport but its hello never stabilized
    /// within the per-attempt timeout. Treated like [`Self::Connect`] by
    /// the capability poller.
    #[error("Server not stable: {0}")]
    NotStable(String),

    /// Deadline exceeded while polling for required capabilities.
    #[error("{message}")]
    CapabilityTimeout {
        /// Human-readable diagnostic including expected and observed sets.
        message: String,
        /// The expected-but-never-observed capability set.
        missing: CapabilitySet,
    },

    /// Commit rejected due to optimistic-lock contention on the
    /// configuration datastore. The only error the push engine retries.
    #[error("Version conflict: {0}")]
    VersionConflict(String),

    /// Any other non-ok RPC reply, or a transport fault during send/wait.
    #[error("RPC failed: {0}")]
    Rpc(String),

    /// Malformed snapshot, template or inbound XML document.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Push retry budget exhausted for one snapshot.
    #[error("Maximum attempt count has been reached for pushing {snapshot}")]
    MaxAttemptsExceeded {
        /// Identity of the offending snapshot.
        snapshot: String,
        /// The last version conflict seen before giving up.
        #[source]
        last_conflict: Option<Box<ConfsyncError>>,
    },

    /// Shutdown secret did not match the configured one.
    #[error("Invalid secret")]
    InvalidSecret,

    /// A declared-singleton module was created under the wrong instance name.
    #[error("Singleton enforcement failed. Expected instance name {expected}")]
    Singleton {
        /// The only instance name the module accepts.
        expected: String,
        /// The rejected instance name.
        got: String,
    },

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Notification serialization error.
    #[error("Notification error: {0}")]
    Notification(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for confsync operations
pub type Result<T> = std::result::Result<T, ConfsyncError>;

impl ConfsyncError {
    /// Whether the capability poller may absorb this error and retry.
    pub fn is_retryable_connect(&self) -> bool {
        matches!(self, ConfsyncError::Connect(_) | ConfsyncError::NotStable(_))
    }
}

impl From<toml::de::Error> for ConfsyncError {
    fn from(err: toml::de::Error) -> Self {
        ConfsyncError::Config(err.to_string())
    }
}

impl From<xmltree::ParseError> for ConfsyncError {
    fn from(err: xmltree::ParseError) -> Self {
        ConfsyncError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ConfsyncError::Connect("refused".into()).is_retryable_connect());
        assert!(ConfsyncError::NotStable("no hello".into()).is_retryable_connect());
        assert!(!ConfsyncError::Rpc("boom".into()).is_retryable_connect());
        assert!(!ConfsyncError::VersionConflict("stale".into()).is_retryable_connect());
    }

    #[test]
    fn test_max_attempts_chains_cause() {
        let err = ConfsyncError::MaxAttemptsExceeded {
            snapshot: "snapshot-0".to_string(),
            last_conflict: Some(Box::new(ConfsyncError::VersionConflict("stale".into()))),
        };
        assert!(err.to_string().contains("snapshot-0"));
        let source = std::error::Error::source(&err).expect("cause chained");
        assert!(source.to_string().contains("stale"));
    }

    #[test]
    fn test_singleton_message() {
        let err = ConfsyncError::Singleton {
            expected: "shutdown".to_string(),
            got: "foo".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Singleton enforcement failed. Expected instance name shutdown"
        );
    }
}
