//! Error types for the placement controller.

use thiserror::Error;

/// Placement controller errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Invalid or missing configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Store gateway failure.
    #[error("store error: {0}")]
    Store(#[from] skyward_store::StoreError),

    /// Strategy construction or evaluation failure.
    #[error("strategy error: {0}")]
    Strategy(#[from] skyward_strategy::StrategyError),

    /// The telemetry snapshot was empty. A later cluster event
    /// re-triggers evaluation; no retry is scheduled.
    #[error("no UAV nodes available")]
    NoNodesAvailable,

    /// Every node was removed by the strategy's filter.
    #[error("no nodes passed filter")]
    NoEligibleNodes,
}

/// Result type for placement operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
