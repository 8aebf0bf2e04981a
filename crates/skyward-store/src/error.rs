//! Error types for the store gateway.

use thiserror::Error;

/// Store gateway errors, classified independently of the transport.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O or connection failure talking to the store.
    #[error("transport error: {0}")]
    Transport(String),

    /// Version token was stale, or a binding already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Named record is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Record failed to encode or decode.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// Record violates its invariant ranges.
    #[error("validation error: {0}")]
    Validation(#[from] skyward_model::ModelError),

    /// The watch stream ended; callers re-subscribe.
    #[error("watch stream closed")]
    StreamClosed,

    /// Operation aborted by shutdown.
    #[error("operation cancelled")]
    Cancelled,

    /// Backend misconfiguration (bad URL, pool setup).
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Wraps a transport-level failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Wraps an encode/decode failure.
    pub fn serialisation(err: impl std::fmt::Display) -> Self {
        Self::Serialisation(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
