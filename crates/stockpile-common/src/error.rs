//! Error types for Stockpile
//!
//! This module defines the common error taxonomy used throughout the
//! system. Only configuration errors are fatal; everything else is
//! absorbed, counted, and retried on a later cycle.

use crate::types::{DirectiveKind, NodeUuid};
use thiserror::Error;

/// Common result type for Stockpile operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Stockpile
#[derive(Debug, Error)]
pub enum Error {
    // Polling errors
    #[error("transient fetch failure from {service}: {reason}")]
    TransientFetch { service: String, reason: String },

    #[error("request timeout")]
    Timeout,

    #[error("malformed {kind} record: missing {field}")]
    MalformedRecord { kind: String, field: String },

    // Strategy errors
    #[error("no image in the catalog carries a weight greater than zero")]
    InsufficientImages,

    // Dispatch errors
    #[error("failed to dispatch {kind} directive to node {node}: {reason}")]
    DirectiveDispatch {
        kind: DirectiveKind,
        node: NodeUuid,
        reason: String,
    },

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transient fetch error
    pub fn transient_fetch(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransientFetch {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed record error
    pub fn malformed_record(kind: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind: kind.into(),
            field: field.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::TransientFetch { .. } | Self::DirectiveDispatch { .. }
        )
    }

    /// Check if this error is fatal at startup
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::transient_fetch("inventory", "connection refused").is_retryable());
        assert!(
            Error::DirectiveDispatch {
                kind: DirectiveKind::Cache,
                node: NodeUuid::new("n1"),
                reason: "503".into(),
            }
            .is_retryable()
        );
        assert!(!Error::InsufficientImages.is_retryable());
        assert!(!Error::configuration("bad percentage").is_retryable());
    }

    #[test]
    fn test_error_fatal() {
        assert!(Error::configuration("unknown strategy").is_fatal());
        assert!(!Error::InsufficientImages.is_fatal());
        assert!(!Error::malformed_record("node", "uuid").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::malformed_record("node", "provision_state");
        assert_eq!(err.to_string(), "malformed node record: missing provision_state");
    }
}
