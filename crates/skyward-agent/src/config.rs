//! Configuration for the telemetry agent.

use figment::providers::Env;
use figment::Figment;
use serde::{Deserialize, Deserializer};
use skyward_store::StoreConfig;

use crate::error::{AgentError, Result};

/// Environment variables the agent recognises.
const ENV_KEYS: &[&str] = &[
    "NODE_NAME",
    "NAMESPACE",
    "CLUSTER_STORE_URL",
    "COLLECTION_INTERVAL",
    "LOG_LEVEL",
    "STRUCTURED_LOGGING",
    "UAV_HARDWARE_MODEL",
    "UAV_FIRMWARE_VERSION",
    "UAV_SERIAL_NUMBER",
];

/// Telemetry agent configuration, sourced from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Identity of the local node. Required.
    pub node_name: String,
    /// Store namespace telemetry records are written into.
    pub namespace: String,
    /// Valkey URL; empty selects the in-memory store.
    pub cluster_store_url: String,
    /// Sampling interval in seconds.
    pub collection_interval: u64,
    /// Log filter: debug, info, warn or error.
    pub log_level: String,
    /// Truthy values (true/1/yes) switch to JSON logs.
    #[serde(deserialize_with = "truthy", default)]
    pub structured_logging: bool,
    /// Hardware identification carried in the metadata sub-record.
    pub hardware_model: String,
    pub firmware_version: String,
    pub serial_number: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            namespace: "default".to_string(),
            cluster_store_url: String::new(),
            collection_interval: 10,
            log_level: "info".to_string(),
            structured_logging: false,
            hardware_model: "Generic-UAV-v1".to_string(),
            firmware_version: "1.0.0".to_string(),
            serial_number: "UAV-000000".to_string(),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from the environment over the defaults.
    pub fn from_env() -> Result<Self> {
        Figment::new()
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
            .map_err(|e| AgentError::Config(e.to_string()))
    }

    /// Checks the configuration for startup-fatal mistakes.
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(AgentError::Config(
                "nodeName is required (set NODE_NAME)".to_string(),
            ));
        }
        if self.namespace.is_empty() {
            return Err(AgentError::Config("namespace cannot be empty".to_string()));
        }
        if self.collection_interval == 0 {
            return Err(AgentError::Config(
                "collectionInterval must be > 0".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_is_required() {
        assert!(AgentConfig::default().validate().is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = AgentConfig {
            node_name: "uav-01".to_string(),
            collection_interval: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn populated_config_validates() {
        let config = AgentConfig {
            node_name: "uav-01".to_string(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.collection_interval, 10);
    }
}
