//! Configuration for the routing advisor.

use figment::providers::Env;
use figment::Figment;
use serde::{Deserialize, Deserializer};
use skyward_store::StoreConfig;

use crate::error::{Result, RouterError};

/// Environment variables the advisor recognises.
const ENV_KEYS: &[&str] = &[
    "NODE_NAME",
    "ALGORITHM",
    "NAMESPACE",
    "CLUSTER_STORE_URL",
    "API_PORT",
    "MAX_DISTANCE",
    "MIN_BATTERY",
    "LOG_LEVEL",
    "STRUCTURED_LOGGING",
];

/// Routing advisor configuration, sourced from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Identity of the local node. Required.
    pub node_name: String,
    /// Registry name of the routing strategy to use.
    pub algorithm: String,
    /// Store namespace for telemetry records.
    pub namespace: String,
    /// Valkey URL; empty selects the in-memory store.
    pub cluster_store_url: String,
    /// HTTP API listener port.
    pub api_port: u16,
    /// Distance-routing cutoff in kilometres.
    pub max_distance: f64,
    /// Battery-routing floor in percent.
    pub min_battery: f64,
    /// Log filter: debug, info, warn or error.
    pub log_level: String,
    /// Truthy values (true/1/yes) switch to JSON logs.
    #[serde(deserialize_with = "truthy", default)]
    pub structured_logging: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            algorithm: "distance-based".to_string(),
            namespace: "default".to_string(),
            cluster_store_url: String::new(),
            api_port: 8080,
            max_distance: 1000.0,
            min_battery: 20.0,
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl RouterConfig {
    /// Loads configuration from the environment over the defaults.
    pub fn from_env() -> Result<Self> {
        Figment::new()
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
            .map_err(|e| RouterError::Config(e.to_string()))
    }

    /// Checks the configuration for startup-fatal mistakes.
    pub fn validate(&self) -> Result<()> {
        if self.node_name.is_empty() {
            return Err(RouterError::Config(
                "nodeName is required (set NODE_NAME)".to_string(),
            ));
        }
        if self.algorithm.is_empty() {
            return Err(RouterError::Config("algorithm cannot be empty".to_string()));
        }
        if self.namespace.is_empty() {
            return Err(RouterError::Config("namespace cannot be empty".to_string()));
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
    fn missing_node_name_is_rejected() {
        let config = RouterConfig::default();
        assert!(matches!(config.validate(), Err(RouterError::Config(_))));
    }

    #[test]
    fn populated_config_validates() {
        let config = RouterConfig {
            node_name: "uav-01".to_string(),
            ..RouterConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.api_port, 8080);
        assert!((config.max_distance - 1000.0).abs() < 1e-9);
        assert!((config.min_battery - 20.0).abs() < 1e-9);
    }
}
