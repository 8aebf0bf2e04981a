//! Skyward scheduler - the placement control loop.
//!
//! Watches the cluster's work queue for unplaced items addressed to this
//! controller, ranks candidate nodes with the configured strategy over the
//! current telemetry snapshot, and commits exactly one binding per item.
//!
//! The controller performs one placement per work item and never
//! re-places; a failed attempt relies on the cluster resurfacing the item.

pub mod config;
pub mod controller;
pub mod error;

pub use config::SchedulerConfig;
pub use controller::PlacementController;
pub use error::{Result, SchedulerError};
