//! Test fixtures for scheduler integration tests.

use std::collections::HashMap;

use chrono::Utc;
use skyward_model::{
    BatteryData, GpsData, NetworkData, UavTelemetry, WorkItem, ANNOTATION_TARGET_LAT,
    ANNOTATION_TARGET_LON,
};
use skyward_scheduler::SchedulerConfig;

/// Builder for telemetry fixtures.
pub struct TelemetryBuilder {
    node_name: String,
    latitude: f64,
    longitude: f64,
    battery: f64,
    latency_ms: Option<f64>,
}

impl TelemetryBuilder {
    pub fn new(node_name: &str) -> Self {
        Self {
            node_name: node_name.to_string(),
            latitude: 34.0522,
            longitude: -118.2437,
            battery: 80.0,
            latency_ms: None,
        }
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn battery(mut self, percent: f64) -> Self {
        self.battery = percent;
        self
    }

    pub fn latency_ms(mut self, latency: f64) -> Self {
        self.latency_ms = Some(latency);
        self
    }

    pub fn build(self) -> UavTelemetry {
        UavTelemetry {
            node_name: self.node_name,
            gps: GpsData {
                latitude: self.latitude,
                longitude: self.longitude,
                altitude: 60.0,
                heading: 0.0,
                speed: 4.0,
                satellites: 10,
                accuracy: 2.0,
                last_update: Utc::now(),
            },
            battery: BatteryData {
                remaining_percent: self.battery,
                voltage: 11.6,
                current: -5.0,
                temperature: 26.0,
                time_remaining_secs: 1800,
                cycle_count: 50,
            },
            flight: None,
            network: self.latency_ms.map(|latency_ms| NetworkData {
                latency_ms,
                ..NetworkData::default()
            }),
            performance: None,
            health: None,
            metadata: None,
        }
    }
}

/// A work item addressed to the default test scheduler.
pub fn work_item(name: &str) -> WorkItem {
    work_item_for("uav-scheduler", name)
}

/// A work item addressed to a specific scheduler.
pub fn work_item_for(scheduler: &str, name: &str) -> WorkItem {
    WorkItem {
        name: name.to_string(),
        namespace: "default".to_string(),
        scheduler_name: scheduler.to_string(),
        assigned_node: None,
        annotations: HashMap::new(),
    }
}

/// A work item carrying a target-location annotation.
pub fn work_item_with_target(name: &str, lat: &str, lon: &str) -> WorkItem {
    let mut item = work_item(name);
    item.annotations
        .insert(ANNOTATION_TARGET_LAT.to_string(), lat.to_string());
    item.annotations
        .insert(ANNOTATION_TARGET_LON.to_string(), lon.to_string());
    item
}

/// Default test configuration.
pub fn test_config() -> SchedulerConfig {
    SchedulerConfig::default()
}
