//! Validation errors for record types.

use thiserror::Error;

/// Errors raised when a record violates its invariant ranges.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// Latitude outside [-90, 90].
    #[error("invalid latitude {0}: must be between -90 and 90")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("invalid longitude {0}: must be between -180 and 180")]
    InvalidLongitude(f64),

    /// Battery percentage outside [0, 100].
    #[error("invalid battery percentage {0}: must be between 0 and 100")]
    InvalidBatteryPercent(f64),
}
