//! Error types for CRDT operations

use crate::delta::DeltaKind;
use thiserror::Error;

/// CRDT operation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrdtError {
    /// A delta was routed to a CRDT of a different kind.
    #[error("Delta kind mismatch: expected {expected} delta, got {actual}")]
    DeltaKindMismatch { expected: DeltaKind, actual: DeltaKind },

    #[error("Replicated state already set to a {existing}, cannot replace with a {requested}")]
    StateAlreadySet {
        existing: DeltaKind,
        requested: DeltaKind,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CrdtError {
    pub(crate) fn mismatch(expected: DeltaKind, actual: DeltaKind) -> Self {
        tracing::warn!(%expected, %actual, "Rejecting delta of the wrong kind");
        CrdtError::DeltaKindMismatch { expected, actual }
    }
}

impl From<serde_json::Error> for CrdtError {
    fn from(err: serde_json::Error) -> Self {
        CrdtError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for CrdtError {
    fn from(err: toml::de::Error) -> Self {
        CrdtError::ConfigError(err.to_string())
    }
}

/// Result type for CRDT operations
pub type Result<T> = std::result::Result<T, CrdtError>;
