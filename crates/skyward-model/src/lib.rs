//! Skyward model - shared record types for the fleet decision plane.
//!
//! The crate defines the two record families both control planes consume:
//!
//! - **Telemetry**: the per-node fact set (GPS, battery, network, flight,
//!   performance, health) written by the node agent and mirrored by the
//!   scheduler and the routing advisor.
//! - **Workload**: the cluster-side view of work items, pods and service
//!   endpoint aggregates that placement and routing decisions act on.
//!
//! Records are externally sourced and eventually consistent; consumers are
//! expected to tolerate stale and partial data, so validation is explicit
//! (`UavTelemetry::validate`) rather than baked into deserialisation.

pub mod error;
pub mod telemetry;
pub mod workload;

pub use error::ModelError;
pub use telemetry::{
    BatteryData, ConnectionType, FlightData, GpsData, HealthData, HealthStatus, NetworkData,
    PerformanceData, UavMetadata, UavTelemetry, CRITICAL_BATTERY_PERCENT,
};
pub use workload::{
    Endpoint, EndpointAddress, NodePhase, PodRecord, ServiceEndpoints, WorkItem,
    ANNOTATION_TARGET_LAT, ANNOTATION_TARGET_LON,
};
