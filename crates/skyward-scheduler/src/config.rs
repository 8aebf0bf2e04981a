//! Configuration for the placement controller.

use figment::providers::Env;
use figment::Figment;
use serde::{Deserialize, Deserializer};
use skyward_store::StoreConfig;

use crate::error::{Result, SchedulerError};

/// Environment variables the controller recognises.
const ENV_KEYS: &[&str] = &[
    "SCHEDULER_NAME",
    "ALGORITHM_NAME",
    "NAMESPACE",
    "CLUSTER_STORE_URL",
    "WORKER_THREADS",
    "TARGET_LATITUDE",
    "TARGET_LONGITUDE",
    "MIN_BATTERY",
    "MAX_LATENCY",
    "LOG_LEVEL",
    "STRUCTURED_LOGGING",
];

/// Placement controller configuration, sourced from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Identity work items address via their scheduler-name field.
    pub scheduler_name: String,
    /// Registry name of the placement strategy to use.
    pub algorithm_name: String,
    /// Store namespace for telemetry and work items.
    pub namespace: String,
    /// Valkey URL; empty selects the in-memory store.
    pub cluster_store_url: String,
    /// Serial-evaluation workers; above 1, items are partitioned by
    /// name hash.
    pub worker_threads: usize,
    /// Default target for the distance strategy.
    pub target_latitude: f64,
    pub target_longitude: f64,
    /// Battery strategy threshold in percent.
    pub min_battery: f64,
    /// Latency strategy bound in milliseconds.
    pub max_latency: f64,
    /// Log filter: debug, info, warn or error.
    pub log_level: String,
    /// Truthy values (true/1/yes) switch to JSON logs.
    #[serde(deserialize_with = "truthy", default)]
    pub structured_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "uav-scheduler".to_string(),
            algorithm_name: "distance-based".to_string(),
            namespace: "default".to_string(),
            cluster_store_url: String::new(),
            worker_threads: 1,
            target_latitude: 34.0522,
            target_longitude: -118.2437,
            min_battery: 30.0,
            max_latency: 200.0,
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl SchedulerConfig {
    /// Loads configuration from the environment over the defaults.
    pub fn from_env() -> Result<Self> {
        Figment::new()
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
            .map_err(|e| SchedulerError::Config(e.to_string()))
    }

    /// Checks the configuration for startup-fatal mistakes.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler_name.is_empty() {
            return Err(SchedulerError::Config(
                "schedulerName cannot be empty".to_string(),
            ));
        }
        if self.algorithm_name.is_empty() {
            return Err(SchedulerError::Config(
                "algorithmName cannot be empty".to_string(),
            ));
        }
        if self.namespace.is_empty() {
            return Err(SchedulerError::Config(
                "namespace cannot be empty".to_string(),
            ));
        }
        if self.worker_threads < 1 {
            return Err(SchedulerError::Config(
                "workerThreads must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Store gateway configuration derived from this config.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.cluster_store_url.clone(),
            namespace: self.namespace.clone(),
            ..StoreConfig::default()
        }
    }
}

/// Accepts true/1/yes in any of the shapes the environment parser
/// produces (bool, integer or string).
fn truthy<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    struct TruthyVisitor;

    impl serde::de::Visitor<'_> for TruthyVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("a boolean-like value")
        }

        fn visit_bool<E: serde::de::Error>(self, v: bool) -> std::result::Result<bool, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> std::result::Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> std::result::Result<bool, E> {
            Ok(v == 1)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> std::result::Result<bool, E> {
            Ok(matches!(v, "true" | "1" | "yes"))
        }
    }

    deserializer.deserialize_any(TruthyVisitor)
}
