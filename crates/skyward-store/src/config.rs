//! Store gateway configuration.

use std::time::Duration;

/// Connection and polling configuration for the store gateway.
///
/// Built programmatically from the consuming binary's environment config;
/// the retry policy and poll intervals are code constants there.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Valkey connection URL. Empty selects the in-memory backend.
    pub url: String,
    /// Namespace telemetry records live in.
    pub namespace: String,
    /// Retry policy for telemetry upserts.
    pub retry: RetryPolicy,
    /// Poll interval for the unplaced work-item watch (Valkey backend).
    pub watch_poll_interval: Duration,
    /// Resync interval for the topology watch (Valkey backend).
    pub topology_resync: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            namespace: "default".to_string(),
            retry: RetryPolicy::default(),
            watch_poll_interval: Duration::from_secs(2),
            topology_resync: Duration::from_secs(30),
        }
    }
}

/// Retry policy for store writes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}
