//! Error types for the decision engine.

use thiserror::Error;

/// Strategy construction and evaluation errors.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Lookup of a name nobody registered. Fatal at startup.
    #[error("algorithm '{name}' not found in registry (available: {available:?})")]
    UnknownAlgorithm { name: String, available: Vec<String> },

    /// Composite construction rejected its weight vector.
    #[error("invalid composite: {0}")]
    InvalidComposite(String),

    /// Every endpoint was dropped by the hard filter.
    #[error("no eligible endpoints: {0}")]
    NoEligibleEndpoints(String),
}

/// Result type for strategy operations.
pub type Result<T> = std::result::Result<T, StrategyError>;
