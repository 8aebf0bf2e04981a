//! Skyward strategy - the pluggable decision engine.
//!
//! Two parallel contracts share the same shape: [`PlacementStrategy`]
//! scores candidate nodes for a work item, [`RoutingStrategy`] turns a
//! service's endpoint list into traffic weights. Strategies are linked in
//! at build time and registered by name during startup; the [`registry`]
//! is the only process-wide state.
//!
//! Built-in strategies: `distance-based`, `battery-aware`,
//! `network-latency` (placement only) and `composite`.

pub mod error;
pub mod geo;
pub mod placement;
pub mod registry;
pub mod routing;

pub use error::StrategyError;
pub use placement::{NodeScore, PlacementStrategy};
pub use routing::{EndpointWeight, RoutingStrategy};

/// Normalises a composite weight vector to sum to 1.
///
/// A length mismatch falls back to uniform weights; a non-positive sum is
/// a construction error.
pub(crate) fn normalise_weights(
    count: usize,
    weights: Vec<f64>,
) -> Result<Vec<f64>, StrategyError> {
    if count == 0 {
        return Err(StrategyError::InvalidComposite(
            "at least one sub-strategy required".to_string(),
        ));
    }

    let mut weights = if weights.len() == count {
        weights
    } else {
        vec![1.0 / count as f64; count]
    };

    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return Err(StrategyError::InvalidComposite(
            "weights must sum to a positive value".to_string(),
        ));
    }
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}
