//! Canonical JSON projection of telemetry records.
//!
//! A record is stored as a single document: the telemetry under a `spec`
//! key, an optional `status` subobject, and a monotonically increasing
//! version used as the optimistic-concurrency token. The resource name is
//! `uav-<nodeName>`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use skyward_model::{NodePhase, UavTelemetry};

use crate::error::{Result, StoreError};

/// Store resource name for a node's telemetry record.
#[must_use]
pub fn resource_name(node_name: &str) -> String {
    format!("uav-{node_name}")
}

/// The stored document wrapping a telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub spec: UavTelemetry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    /// Version token; bumped on every successful write.
    #[serde(default)]
    pub version: u64,
}

/// Status subobject maintained alongside the telemetry spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStatus {
    pub phase: NodePhase,
    /// RFC 3339 timestamp of the last status write.
    pub last_updated: String,
}

impl RecordStatus {
    /// Builds a status stamped with the current time.
    #[must_use]
    pub fn now(phase: NodePhase) -> Self {
        Self {
            phase,
            last_updated: Utc::now().to_rfc3339(),
        }
    }
}

/// Encodes a stored record to its canonical JSON form.
pub fn encode(record: &StoredRecord) -> Result<String> {
    serde_json::to_string(record).map_err(StoreError::serialisation)
}

/// Decodes a stored record from its canonical JSON form.
pub fn decode(raw: &str) -> Result<StoredRecord> {
    serde_json::from_str(raw).map_err(StoreError::serialisation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skyward_model::{BatteryData, GpsData};

    fn spec(node: &str) -> UavTelemetry {
        UavTelemetry {
            node_name: node.to_string(),
            gps: GpsData {
                latitude: 34.05,
                longitude: -118.24,
                altitude: 60.0,
                heading: 180.0,
                speed: 3.2,
                satellites: 9,
                accuracy: 2.0,
                last_update: Utc::now(),
            },
            battery: BatteryData {
                remaining_percent: 81.0,
                voltage: 11.8,
                current: -4.4,
                temperature: 26.0,
                time_remaining_secs: 2400,
                cycle_count: 77,
            },
            flight: None,
            network: None,
            performance: None,
            health: None,
            metadata: None,
        }
    }

    #[test]
    fn resource_name_has_uav_prefix() {
        assert_eq!(resource_name("node-7"), "uav-node-7");
    }

    #[test]
    fn encode_decode_is_identity() {
        let record = StoredRecord {
            spec: spec("uav-01"),
            status: Some(RecordStatus {
                phase: NodePhase::Active,
                last_updated: "2025-06-01T12:00:00+00:00".to_string(),
            }),
            version: 4,
        };
        let raw = encode(&record).unwrap();
        assert_eq!(decode(&raw).unwrap(), record);
    }

    #[test]
    fn version_defaults_to_zero() {
        let record = StoredRecord {
            spec: spec("uav-01"),
            status: None,
            version: 0,
        };
        let raw = encode(&record).unwrap();
        assert!(!raw.contains("\"status\""));
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.version, 0);
        assert!(decoded.status.is_none());
    }
}
