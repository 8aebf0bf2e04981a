//! Skyward router - the per-node routing advisor.
//!
//! Every node runs one advisor. It mirrors fleet telemetry and service
//! endpoint topology into two in-memory caches and synthesises weighted
//! endpoint lists on request, so outbound traffic can be steered with a
//! sub-millisecond local query. The advisor returns weights; it does not
//! forward traffic itself.

pub mod advisor;
pub mod config;
pub mod error;
pub mod server;

pub use advisor::{CacheStats, RoutingAdvisor};
pub use config::RouterConfig;
pub use error::{Result, RouterError};
