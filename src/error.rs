//! Error types for the memory store.
//!
//! Two layers: [`EngineError`] is what a [`DocumentEngine`](crate::engine::DocumentEngine)
//! reports, [`MemoryStoreError`] is what callers of the store see. Every
//! store failure carries an [`ErrorKind`] so callers can decide whether to
//! retry, treat the failure as absence, or treat it as a configuration bug.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by a document/vector-index engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// An index with this name is already declared.
    #[error("index already exists: {0}")]
    IndexExists(String),

    /// No index with this name is declared.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// The engine could not be reached or rejected the request.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The engine answered with something this crate cannot interpret.
    #[error("malformed engine response: {0}")]
    Protocol(String),
}

/// What kind of resource a [`MemoryStoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Collection,
    Record,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection => f.write_str("collection"),
            Self::Record => f.write_str("record"),
        }
    }
}

/// Coarse classification of a [`MemoryStoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    NotFound,
    SchemaConflict,
    InvalidInput,
    Cancelled,
    Codec,
}

impl ErrorKind {
    /// Stable lowercase name, used in logs and HTTP error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::NotFound => "not_found",
            Self::SchemaConflict => "schema_conflict",
            Self::InvalidInput => "invalid_input",
            Self::Cancelled => "cancelled",
            Self::Codec => "codec",
        }
    }
}

/// Memory store error type.
#[derive(Error, Debug)]
pub enum MemoryStoreError {
    /// The engine is unreachable or failed the request.
    #[error("transport error: {0}")]
    Transport(#[source] EngineError),

    /// An engine round trip exceeded the configured request timeout.
    #[error("engine request timed out after {0:?}")]
    Timeout(Duration),

    /// The requested collection or record does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Name or key of the missing resource.
        name: String,
    },

    /// Collection already declared, or an embedding does not match the
    /// collection's declared dimension.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Collection name cannot be mapped onto a document key prefix.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// The caller's cancellation token fired before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// A stored document could not be mapped to a record.
    #[error("codec error: {0}")]
    Codec(String),
}

impl MemoryStoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::Timeout(_) => ErrorKind::Transport,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::SchemaConflict(_) => ErrorKind::SchemaConflict,
            Self::InvalidCollectionName(_) => ErrorKind::InvalidInput,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Codec(_) => ErrorKind::Codec,
        }
    }

    /// Whether retrying the same call may succeed. Only transport failures
    /// qualify; the store itself never retries.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    pub(crate) fn collection_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: ResourceKind::Collection,
            name: name.into(),
        }
    }
}

impl From<EngineError> for MemoryStoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::IndexExists(name) => {
                Self::SchemaConflict(format!("collection `{name}` already exists"))
            }
            EngineError::UnknownIndex(name) => Self::collection_not_found(name),
            other => Self::Transport(other),
        }
    }
}

impl From<serde_json::Error> for MemoryStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result type alias for memory store operations.
pub type Result<T> = std::result::Result<T, MemoryStoreError>;
