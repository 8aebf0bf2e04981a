//! Error types for the routing advisor.

use thiserror::Error;

/// Routing advisor errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Store gateway failure.
    #[error("store error: {0}")]
    Store(#[from] skyward_store::StoreError),

    /// Strategy evaluation failure, propagated unchanged to the caller.
    #[error("strategy error: {0}")]
    Strategy(#[from] skyward_strategy::StrategyError),

    /// This node's own telemetry is missing from the cache.
    #[error("source node {0} not found in telemetry cache")]
    SourceUnknown(String),

    /// The service has no cached endpoints.
    #[error("no endpoints found for service {0}")]
    NoEndpoints(String),

    /// The telemetry cache stayed empty past the startup deadline.
    /// Fatal for this advisor instance.
    #[error("cache initialisation timed out")]
    CacheInitTimeout,

    /// Listener or server I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RouterError>;
