//! Simulated telemetry sampling.
//!
//! The node-side sensor stack is out of scope; the sampler generates
//! realistic values instead. Each node gets a deterministic home position
//! derived from its name, with per-sample jitter on top, so a fleet of
//! agents spreads out over the operating area and stays put between
//! samples.

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use skyward_model::{
    BatteryData, ConnectionType, FlightData, GpsData, HealthData, HealthStatus, NetworkData,
    PerformanceData, UavMetadata, UavTelemetry, CRITICAL_BATTERY_PERCENT,
};

use crate::config::AgentConfig;

/// Battery level below which a warning is attached.
const LOW_BATTERY_PERCENT: f64 = 30.0;

const FLIGHT_MODES: &[&str] = &["GUIDED", "AUTO", "LOITER", "POSITION_HOLD", "RTL"];

const CONNECTION_TYPES: &[ConnectionType] = &[
    ConnectionType::FourG,
    ConnectionType::FiveG,
    ConnectionType::Wifi,
    ConnectionType::Satellite,
];

/// Generates simulated telemetry for one node.
pub struct TelemetrySampler {
    node_name: String,
    home_latitude: f64,
    home_longitude: f64,
    metadata: UavMetadata,
    rng: Mutex<SmallRng>,
}

impl TelemetrySampler {
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        let seed = name_seed(&config.node_name);
        // Home position inside the operating box, stable per node name.
        let home_latitude = 33.5 + (seed % 1000) as f64 / 1000.0 * 2.0;
        let home_longitude = -119.0 + ((seed / 1000) % 1000) as f64 / 1000.0 * 2.0;

        Self {
            node_name: config.node_name.clone(),
            home_latitude,
            home_longitude,
            metadata: UavMetadata {
                agent_version: env!("CARGO_PKG_VERSION").to_string(),
                hardware_model: config.hardware_model.clone(),
                firmware_version: config.firmware_version.clone(),
                serial_number: config.serial_number.clone(),
            },
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Produces one full telemetry record.
    #[must_use]
    pub fn sample(&self) -> UavTelemetry {
        let mut rng = self.rng.lock();
        let now = Utc::now();

        let battery_percent = 50.0 + rng.gen_range(0.0..50.0);
        let satellites = rng.gen_range(8..=12);
        let armed = rng.gen_bool(0.7);
        let speed = if armed { rng.gen_range(0.0..15.0) } else { 0.0 };
        let altitude = 50.0 + rng.gen_range(0.0..100.0);

        let gps = GpsData {
            latitude: self.home_latitude + (rng.gen::<f64>() - 0.5) * 0.001,
            longitude: self.home_longitude + (rng.gen::<f64>() - 0.5) * 0.001,
            altitude,
            heading: rng.gen_range(0.0..360.0),
            speed,
            satellites,
            accuracy: 2.0 + rng.gen_range(0.0..3.0),
            last_update: now,
        };

        let battery = BatteryData {
            remaining_percent: battery_percent,
            voltage: 10.8 + 1.8 * battery_percent / 100.0,
            current: -5.0 - rng.gen_range(0.0..5.0),
            temperature: 20.0 + rng.gen_range(0.0..15.0),
            time_remaining_secs: (battery_percent / 100.0 * 1800.0) as u64,
            cycle_count: 50 + rng.gen_range(0..200),
        };

        let flight = FlightData {
            armed,
            mode: FLIGHT_MODES[rng.gen_range(0..FLIGHT_MODES.len())].to_string(),
            is_flying: armed && speed > 0.5,
            altitude,
            vertical_speed: rng.gen_range(-2.0..2.0),
            roll_angle: rng.gen_range(-10.0..10.0),
            pitch_angle: rng.gen_range(-10.0..10.0),
            yaw_angle: rng.gen_range(0.0..360.0),
        };

        let network = NetworkData {
            latency_ms: 20.0 + rng.gen_range(0.0..180.0),
            bandwidth_mbps: 10.0 + rng.gen_range(0.0..90.0),
            signal_strength: -90 + rng.gen_range(0..40),
            packet_loss: rng.gen_range(0.0..0.05),
            connection_type: CONNECTION_TYPES[rng.gen_range(0..CONNECTION_TYPES.len())],
        };

        let performance = PerformanceData {
            cpu_usage: rng.gen_range(5.0..95.0),
            memory_usage: rng.gen_range(20.0..80.0),
            disk_usage: rng.gen_range(10.0..60.0),
            temperature: 30.0 + rng.gen_range(0.0..30.0),
            uptime_secs: rng.gen_range(3600..86400),
        };

        UavTelemetry {
            node_name: self.node_name.clone(),
            gps,
            battery,
            flight: Some(flight),
            network: Some(network),
            performance: Some(performance),
            health: Some(health_for(battery_percent, satellites)),
            metadata: Some(self.metadata.clone()),
        }
    }
}

/// Derives the health assessment from the sampled values.
pub(crate) fn health_for(battery_percent: f64, satellites: u32) -> HealthData {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if battery_percent < CRITICAL_BATTERY_PERCENT {
        errors.push(format!("critical battery level: {battery_percent:.1}%"));
    } else if battery_percent < LOW_BATTERY_PERCENT {
        warnings.push(format!("low battery: {battery_percent:.1}%"));
    }
    if satellites < 6 {
        warnings.push(format!("weak GPS fix: {satellites} satellites"));
    }

    let status = if !errors.is_empty() {
        HealthStatus::Critical
    } else if !warnings.is_empty() {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    HealthData {
        status,
        errors,
        warnings,
        last_health_check: Utc::now(),
    }
}

fn name_seed(node_name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    node_name.hash(&mut hasher);
    hasher.finish()
}
