//! Placement strategies for node selection.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use skyward_model::{UavTelemetry, WorkItem, ANNOTATION_TARGET_LAT, ANNOTATION_TARGET_LON};

use crate::error::Result;
use crate::geo::haversine_km;

/// Scoring result for one candidate node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeScore {
    pub node_name: String,
    /// Higher wins; built-in strategies stay within [0, 100].
    pub score: f64,
    /// Human-readable justification for logs.
    pub reason: String,
}

/// Trait for placement strategies.
///
/// `filter` removes hard-fails (an empty result is legal and means "none
/// eligible"); `score` produces one [`NodeScore`] per input node, in input
/// order. The two are separate so callers can choose strict or permissive
/// mode by whether they filter first.
pub trait PlacementStrategy: Send + Sync {
    /// Returns the registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Removes nodes that must not receive the item.
    fn filter(&self, item: &WorkItem, nodes: Vec<UavTelemetry>) -> Result<Vec<UavTelemetry>>;

    /// Scores every input node.
    fn score(&self, item: &WorkItem, nodes: &[UavTelemetry]) -> Result<Vec<NodeScore>>;
}

/// Prefers nodes closest to a target location.
///
/// The target comes from the work item's `target-lat`/`target-lon`
/// annotations when both parse as floats, falling back to the configured
/// default. Resolution happens per call; the strategy itself is stateless.
pub struct DistanceBased {
    target_latitude: f64,
    target_longitude: f64,
}

impl DistanceBased {
    #[must_use]
    pub fn new(target_latitude: f64, target_longitude: f64) -> Self {
        Self {
            target_latitude,
            target_longitude,
        }
    }

    fn target_for(&self, item: &WorkItem) -> (f64, f64) {
        if let (Some(lat), Some(lon)) = (
            item.annotations.get(ANNOTATION_TARGET_LAT),
            item.annotations.get(ANNOTATION_TARGET_LON),
        ) {
            if let (Ok(lat), Ok(lon)) = (lat.parse(), lon.parse()) {
                return (lat, lon);
            }
        }
        (self.target_latitude, self.target_longitude)
    }
}

impl PlacementStrategy for DistanceBased {
    fn name(&self) -> &'static str {
        "distance-based"
    }

    fn filter(&self, _item: &WorkItem, nodes: Vec<UavTelemetry>) -> Result<Vec<UavTelemetry>> {
        // No hard filter; every node gets a score.
        Ok(nodes)
    }

    fn score(&self, item: &WorkItem, nodes: &[UavTelemetry]) -> Result<Vec<NodeScore>> {
        let (target_lat, target_lon) = self.target_for(item);

        Ok(nodes
            .iter()
            .map(|m| {
                let km = haversine_km(m.gps.latitude, m.gps.longitude, target_lat, target_lon);
                NodeScore {
                    node_name: m.node_name.clone(),
                    score: 100.0 / (1.0 + km),
                    reason: format!(
                        "distance: {km:.2}km from target ({target_lat:.4},{target_lon:.4})"
                    ),
                }
            })
            .collect())
    }
}

/// Prefers nodes with charge to spare.
pub struct BatteryAware {
    min_battery: f64,
}

impl BatteryAware {
    #[must_use]
    pub fn new(min_battery: f64) -> Self {
        Self { min_battery }
    }
}

impl PlacementStrategy for BatteryAware {
    fn name(&self) -> &'static str {
        "battery-aware"
    }

    fn filter(&self, _item: &WorkItem, nodes: Vec<UavTelemetry>) -> Result<Vec<UavTelemetry>> {
        Ok(nodes
            .into_iter()
            .filter(|m| m.battery.remaining_percent >= self.min_battery)
            .collect())
    }

    fn score(&self, _item: &WorkItem, nodes: &[UavTelemetry]) -> Result<Vec<NodeScore>> {
        Ok(nodes
            .iter()
            .map(|m| {
                let pct = m.battery.remaining_percent;
                let score = if pct < self.min_battery { 0.0 } else { pct };
                NodeScore {
                    node_name: m.node_name.clone(),
                    score,
                    reason: format!("battery: {pct:.1}% (min: {:.1}%)", self.min_battery),
                }
            })
            .collect())
    }
}

/// Prefers nodes with a low-latency uplink.
pub struct NetworkLatency {
    max_latency_ms: f64,
}

impl NetworkLatency {
    #[must_use]
    pub fn new(max_latency_ms: f64) -> Self {
        Self { max_latency_ms }
    }
}

impl PlacementStrategy for NetworkLatency {
    fn name(&self) -> &'static str {
        "network-latency"
    }

    fn filter(&self, _item: &WorkItem, nodes: Vec<UavTelemetry>) -> Result<Vec<UavTelemetry>> {
        Ok(nodes
            .into_iter()
            .filter(|m| {
                m.network
                    .as_ref()
                    .is_some_and(|n| n.latency_ms <= self.max_latency_ms)
            })
            .collect())
    }

    fn score(&self, _item: &WorkItem, nodes: &[UavTelemetry]) -> Result<Vec<NodeScore>> {
        Ok(nodes
            .iter()
            .map(|m| match &m.network {
                // Score does not drop nodes without network data; the
                // filter does. Callers pick strict or permissive mode.
                None => NodeScore {
                    node_name: m.node_name.clone(),
                    score: 0.0,
                    reason: "no network data".to_string(),
                },
                Some(network) => {
                    let latency = network.latency_ms;
                    let score = (100.0 * (1.0 - latency / self.max_latency_ms)).max(0.0);
                    NodeScore {
                        node_name: m.node_name.clone(),
                        score,
                        reason: format!(
                            "latency: {latency:.1}ms (max: {:.1}ms)",
                            self.max_latency_ms
                        ),
                    }
                }
            })
            .collect())
    }
}

/// Weighted sum over an ordered list of sub-strategies.
pub struct Composite {
    strategies: Vec<Arc<dyn PlacementStrategy>>,
    weights: Vec<f64>,
}

impl Composite {
    /// Builds a composite; weights are normalised to sum 1, with a length
    /// mismatch replaced by uniform weights.
    pub fn new(strategies: Vec<Arc<dyn PlacementStrategy>>, weights: Vec<f64>) -> Result<Self> {
        let weights = crate::normalise_weights(strategies.len(), weights)?;
        Ok(Self {
            strategies,
            weights,
        })
    }
}

impl PlacementStrategy for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn filter(&self, item: &WorkItem, nodes: Vec<UavTelemetry>) -> Result<Vec<UavTelemetry>> {
        // Pipeline: each stage filters the previous stage's survivors.
        let mut filtered = nodes;
        for strategy in &self.strategies {
            filtered = strategy.filter(item, filtered)?;
            if filtered.is_empty() {
                return Ok(filtered);
            }
        }
        Ok(filtered)
    }

    fn score(&self, item: &WorkItem, nodes: &[UavTelemetry]) -> Result<Vec<NodeScore>> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        let mut reasons: HashMap<String, Vec<String>> = HashMap::new();

        for (strategy, weight) in self.strategies.iter().zip(&self.weights) {
            let scores = strategy.score(item, nodes)?;
            for s in scores {
                *totals.entry(s.node_name.clone()).or_default() += s.score * weight;
                reasons.entry(s.node_name).or_default().push(format!(
                    "{}({:.0}%, score:{:.1})",
                    strategy.name(),
                    weight * 100.0,
                    s.score
                ));
            }
        }

        Ok(nodes
            .iter()
            .filter_map(|m| {
                totals.get(&m.node_name).map(|total| NodeScore {
                    node_name: m.node_name.clone(),
                    score: *total,
                    reason: format!(
                        "composite: [{}]",
                        reasons
                            .get(&m.node_name)
                            .map(|r| r.join(", "))
                            .unwrap_or_default()
                    ),
                })
            })
            .collect())
    }
}
