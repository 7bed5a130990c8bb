//! Error taxonomy for ScopeForge.
//!
//! Core operations return [`Error`] via `thiserror`. Nothing here is
//! retried automatically; retry is a caller policy. Fatal errors cross
//! the API boundary as a [`Failure`] (kind + message), never as a raw
//! error chain.

use serde::{Deserialize, Serialize};

/// Top-level error type for knowledge-base and analysis operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Embedding length disagrees with the index dimension. Configuration bug.
    #[error("dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index holds zero chunks.
    #[error("index is empty")]
    EmptyIndex,

    /// One reasoning provider missed its deadline.
    #[error("provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// One reasoning provider returned an error or an unusable draft.
    #[error("provider '{provider}' failed: {message}")]
    ProviderFailed { provider: String, message: String },

    /// No reasoning provider produced a draft for the request.
    #[error("no reasoning provider available: {message}")]
    ProviderUnavailable { message: String },

    /// Embedding or index write failed during ingest.
    #[error("ingest failed: {message}")]
    IngestFailure { message: String },

    /// The embedding provider could not embed a query.
    #[error("embedding failed: {message}")]
    Embedding { message: String },

    /// Persisted chunks could not be read back.
    #[error("storage error: {message}")]
    Storage { message: String },
}

/// Convenience alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DimensionMismatch,
    EmptyIndex,
    ProviderTimeout,
    ProviderFailed,
    ProviderUnavailable,
    IngestFailure,
    Embedding,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::EmptyIndex => "empty_index",
            ErrorKind::ProviderTimeout => "provider_timeout",
            ErrorKind::ProviderFailed => "provider_failed",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::IngestFailure => "ingest_failure",
            ErrorKind::Embedding => "embedding",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Typed failure description handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::EmptyIndex => ErrorKind::EmptyIndex,
            Error::ProviderTimeout { .. } => ErrorKind::ProviderTimeout,
            Error::ProviderFailed { .. } => ErrorKind::ProviderFailed,
            Error::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            Error::IngestFailure { .. } => ErrorKind::IngestFailure,
            Error::Embedding { .. } => ErrorKind::Embedding,
            Error::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub fn failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }

    /// Whether the error aborts the whole request.
    ///
    /// Single-provider timeouts and failures degrade instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::ProviderTimeout { .. } | Error::ProviderFailed { .. } | Error::EmptyIndex
        )
    }

    pub fn ingest(msg: impl Into<String>) -> Self {
        Error::IngestFailure {
            message: msg.into(),
        }
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Error::Embedding {
            message: msg.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage {
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::ProviderUnavailable {
            message: msg.into(),
        }
    }
}
