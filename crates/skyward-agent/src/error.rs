//! Error types for the telemetry agent.

use thiserror::Error;

/// Telemetry agent errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Store gateway failure.
    #[error("store error: {0}")]
    Store(#[from] skyward_store::StoreError),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
