//! Per-node telemetry records.
//!
//! A `UavTelemetry` record is owned by exactly one node; the node agent is
//! its sole writer. GPS and battery are mandatory, the remaining
//! sub-records are annotative and may be absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Battery level below which a node is considered critically low.
pub const CRITICAL_BATTERY_PERCENT: f64 = 20.0;

/// Complete telemetry for a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UavTelemetry {
    /// Node this record describes (unique across the fleet).
    pub node_name: String,
    /// GPS fix. Mandatory; an out-of-range position invalidates the record.
    pub gps: GpsData,
    /// Battery state. Mandatory.
    pub battery: BatteryData,
    /// Flight status, if the flight controller reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight: Option<FlightData>,
    /// Link quality, if the modem reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkData>,
    /// System performance counters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceData>,
    /// Aggregated health assessment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthData>,
    /// Hardware and firmware identification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<UavMetadata>,
}

impl UavTelemetry {
    /// Checks the record against its invariant ranges.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.gps.validate()?;
        self.battery.validate()?;
        Ok(())
    }

    /// Returns true if the battery is below the given threshold.
    #[must_use]
    pub fn is_low_battery(&self, threshold: f64) -> bool {
        self.battery.remaining_percent < threshold
    }

    /// Returns true if the battery is critically low.
    #[must_use]
    pub fn is_critical_battery(&self) -> bool {
        self.battery.remaining_percent < CRITICAL_BATTERY_PERCENT
    }
}

/// GPS fix data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsData {
    /// Degrees, positive north. Must be within [-90, 90].
    pub latitude: f64,
    /// Degrees, positive east. Must be within [-180, 180].
    pub longitude: f64,
    /// Metres above mean sea level.
    #[serde(default)]
    pub altitude: f64,
    /// Degrees clockwise from true north.
    #[serde(default)]
    pub heading: f64,
    /// Ground speed in m/s.
    #[serde(default)]
    pub speed: f64,
    /// Satellites used in the fix.
    #[serde(default)]
    pub satellites: u32,
    /// Estimated horizontal accuracy in metres.
    #[serde(default)]
    pub accuracy: f64,
    /// Time of the fix.
    #[serde(default = "unix_epoch")]
    pub last_update: DateTime<Utc>,
}

impl GpsData {
    /// Checks the position against the valid coordinate ranges.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ModelError::InvalidLatitude(self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ModelError::InvalidLongitude(self.longitude));
        }
        Ok(())
    }
}

/// Battery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryData {
    /// Remaining charge in percent. Must be within [0, 100].
    pub remaining_percent: f64,
    #[serde(default)]
    pub voltage: f64,
    /// Amperes; negative while discharging.
    #[serde(default)]
    pub current: f64,
    /// Pack temperature in degrees Celsius.
    #[serde(default)]
    pub temperature: f64,
    /// Estimated seconds of charge remaining.
    #[serde(default)]
    pub time_remaining_secs: u64,
    #[serde(default)]
    pub cycle_count: u32,
}

impl BatteryData {
    /// Checks the charge level against the valid range.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !(0.0..=100.0).contains(&self.remaining_percent) {
            return Err(ModelError::InvalidBatteryPercent(self.remaining_percent));
        }
        Ok(())
    }
}

/// Flight controller status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlightData {
    #[serde(default)]
    pub armed: bool,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub is_flying: bool,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub vertical_speed: f64,
    #[serde(default)]
    pub roll_angle: f64,
    #[serde(default)]
    pub pitch_angle: f64,
    #[serde(default)]
    pub yaw_angle: f64,
}

/// Link quality as reported by the node's modem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkData {
    /// Round-trip latency to the control plane in milliseconds.
    #[serde(default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub bandwidth_mbps: f64,
    /// Signal strength in dBm.
    #[serde(default)]
    pub signal_strength: i32,
    /// Packet loss fraction in [0, 1].
    #[serde(default)]
    pub packet_loss: f64,
    #[serde(default)]
    pub connection_type: ConnectionType,
}

/// Uplink technology in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionType {
    #[serde(rename = "4G")]
    FourG,
    #[serde(rename = "5G")]
    FiveG,
    #[serde(rename = "WIFI")]
    Wifi,
    #[serde(rename = "SATELLITE")]
    Satellite,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

/// System performance counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceData {
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub memory_usage: f64,
    #[serde(default)]
    pub disk_usage: f64,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default)]
    pub uptime_secs: u64,
}

/// Aggregated health assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default = "unix_epoch")]
    pub last_health_check: DateTime<Utc>,
}

/// Health classification used for status phase reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    #[default]
    Unknown,
}

/// Hardware and firmware identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UavMetadata {
    #[serde(default)]
    pub agent_version: String,
    #[serde(default)]
    pub hardware_model: String,
    #[serde(default)]
    pub firmware_version: String,
    #[serde(default)]
    pub serial_number: String,
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(lat: f64, lon: f64, battery: f64) -> UavTelemetry {
        UavTelemetry {
            node_name: "uav-01".to_string(),
            gps: GpsData {
                latitude: lat,
                longitude: lon,
                altitude: 80.0,
                heading: 90.0,
                speed: 5.0,
                satellites: 10,
                accuracy: 2.5,
                last_update: Utc::now(),
            },
            battery: BatteryData {
                remaining_percent: battery,
                voltage: 11.4,
                current: -6.2,
                temperature: 28.0,
                time_remaining_secs: 1800,
                cycle_count: 120,
            },
            flight: None,
            network: None,
            performance: None,
            health: None,
            metadata: None,
        }
    }

    #[test]
    fn valid_record_passes() {
        assert!(telemetry(34.05, -118.24, 75.0).validate().is_ok());
    }

    #[test]
    fn latitude_bounds_enforced() {
        assert!(matches!(
            telemetry(90.1, 0.0, 50.0).validate(),
            Err(ModelError::InvalidLatitude(_))
        ));
        assert!(matches!(
            telemetry(-90.1, 0.0, 50.0).validate(),
            Err(ModelError::InvalidLatitude(_))
        ));
        assert!(telemetry(90.0, 0.0, 50.0).validate().is_ok());
        assert!(telemetry(-90.0, 0.0, 50.0).validate().is_ok());
    }

    #[test]
    fn longitude_bounds_enforced() {
        assert!(matches!(
            telemetry(0.0, 180.5, 50.0).validate(),
            Err(ModelError::InvalidLongitude(_))
        ));
        assert!(telemetry(0.0, -180.0, 50.0).validate().is_ok());
    }

    #[test]
    fn battery_bounds_enforced() {
        assert!(matches!(
            telemetry(0.0, 0.0, 100.5).validate(),
            Err(ModelError::InvalidBatteryPercent(_))
        ));
        assert!(matches!(
            telemetry(0.0, 0.0, -0.1).validate(),
            Err(ModelError::InvalidBatteryPercent(_))
        ));
        assert!(telemetry(0.0, 0.0, 0.0).validate().is_ok());
        assert!(telemetry(0.0, 0.0, 100.0).validate().is_ok());
    }

    #[test]
    fn low_battery_thresholds() {
        let m = telemetry(0.0, 0.0, 19.9);
        assert!(m.is_low_battery(30.0));
        assert!(m.is_critical_battery());

        let m = telemetry(0.0, 0.0, 20.0);
        assert!(!m.is_critical_battery());
    }

    #[test]
    fn serde_round_trip_is_identity() {
        let mut m = telemetry(40.71, -74.01, 62.5);
        m.network = Some(NetworkData {
            latency_ms: 42.0,
            bandwidth_mbps: 120.0,
            signal_strength: -67,
            packet_loss: 0.01,
            connection_type: ConnectionType::FiveG,
        });
        m.health = Some(HealthData {
            status: HealthStatus::Warning,
            errors: vec![],
            warnings: vec!["low signal".to_string()],
            last_health_check: Utc::now(),
        });

        let json = serde_json::to_string(&m).unwrap();
        let back: UavTelemetry = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn connection_type_uses_wire_names() {
        let json = serde_json::to_string(&ConnectionType::FourG).unwrap();
        assert_eq!(json, "\"4G\"");
        let back: ConnectionType = serde_json::from_str("\"SATELLITE\"").unwrap();
        assert_eq!(back, ConnectionType::Satellite);
    }

    #[test]
    fn missing_gps_fails_to_decode() {
        let json = r#"{"nodeName":"uav-01","battery":{"remainingPercent":50.0}}"#;
        assert!(serde_json::from_str::<UavTelemetry>(json).is_err());
    }

    #[test]
    fn partial_record_decodes_with_defaults() {
        let json = r#"{
            "nodeName": "uav-02",
            "gps": {"latitude": 1.0, "longitude": 2.0},
            "battery": {"remainingPercent": 88.0}
        }"#;
        let m: UavTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(m.gps.satellites, 0);
        assert_eq!(m.gps.last_update, DateTime::UNIX_EPOCH);
        assert!(m.network.is_none());
        assert!(m.validate().is_ok());
    }
}
