//! Routing strategies for endpoint weighting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use skyward_model::{Endpoint, UavTelemetry};
use tracing::debug;

use crate::error::{Result, StrategyError};
use crate::geo::haversine_km;

/// Default cutoff for the distance-based router in kilometres.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 1000.0;

/// Default battery floor for the battery-aware router in percent.
pub const DEFAULT_MIN_BATTERY_PERCENT: f64 = 20.0;

/// Exponential decay scale for distance weights in kilometres.
const DECAY_SCALE_KM: f64 = 50.0;

/// Traffic weight for one endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointWeight {
    pub endpoint: Endpoint,
    /// Proportional traffic share within a priority, in [1, 100].
    pub weight: u32,
    /// Lower is preferred; built-ins emit a single priority class.
    pub priority: u32,
    /// Human-readable justification for logs and debugging.
    pub reason: String,
}

/// Trait for routing strategies.
///
/// Implementations may drop endpoints whose target telemetry is missing or
/// fails their hard filter; dropping everything is the
/// [`StrategyError::NoEligibleEndpoints`] error.
pub trait RoutingStrategy: Send + Sync {
    /// Returns the registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Computes weights for the given endpoints as seen from the source
    /// node.
    fn compute_weights(
        &self,
        source_node: &str,
        source: &UavTelemetry,
        endpoints: &[Endpoint],
        telemetry: &HashMap<String, UavTelemetry>,
    ) -> Result<Vec<EndpointWeight>>;
}

/// Steers traffic towards geographically close endpoints.
///
/// Weights decay exponentially with distance; the floor of 1 means an
/// endpoint at the maximum allowed distance still receives nonzero
/// traffic.
pub struct DistanceBased {
    max_distance_km: f64,
}

impl DistanceBased {
    /// Creates the router; a non-positive cutoff selects the default.
    #[must_use]
    pub fn new(max_distance_km: f64) -> Self {
        let max_distance_km = if max_distance_km <= 0.0 {
            DEFAULT_MAX_DISTANCE_KM
        } else {
            max_distance_km
        };
        Self { max_distance_km }
    }
}

impl RoutingStrategy for DistanceBased {
    fn name(&self) -> &'static str {
        "distance-based"
    }

    fn compute_weights(
        &self,
        _source_node: &str,
        source: &UavTelemetry,
        endpoints: &[Endpoint],
        telemetry: &HashMap<String, UavTelemetry>,
    ) -> Result<Vec<EndpointWeight>> {
        let mut weights = Vec::with_capacity(endpoints.len());

        for ep in endpoints {
            let Some(target) = telemetry.get(&ep.node_name) else {
                continue;
            };

            let km = haversine_km(
                source.gps.latitude,
                source.gps.longitude,
                target.gps.latitude,
                target.gps.longitude,
            );
            if km > self.max_distance_km {
                continue;
            }

            let weight = (100.0 * (-km / DECAY_SCALE_KM).exp()).round().max(1.0) as u32;
            weights.push(EndpointWeight {
                endpoint: ep.clone(),
                weight,
                priority: 0,
                reason: format!("distance: {km:.2}km"),
            });
        }

        if weights.is_empty() {
            return Err(StrategyError::NoEligibleEndpoints(format!(
                "no endpoints within {:.2} km",
                self.max_distance_km
            )));
        }
        Ok(weights)
    }
}

/// Steers traffic away from low-charge nodes.
pub struct BatteryAware {
    min_battery: f64,
}

impl BatteryAware {
    /// Creates the router; a non-positive threshold selects the default.
    #[must_use]
    pub fn new(min_battery: f64) -> Self {
        let min_battery = if min_battery <= 0.0 {
            DEFAULT_MIN_BATTERY_PERCENT
        } else {
            min_battery
        };
        Self { min_battery }
    }
}

impl RoutingStrategy for BatteryAware {
    fn name(&self) -> &'static str {
        "battery-aware"
    }

    fn compute_weights(
        &self,
        _source_node: &str,
        _source: &UavTelemetry,
        endpoints: &[Endpoint],
        telemetry: &HashMap<String, UavTelemetry>,
    ) -> Result<Vec<EndpointWeight>> {
        let mut weights = Vec::with_capacity(endpoints.len());

        for ep in endpoints {
            let Some(target) = telemetry.get(&ep.node_name) else {
                continue;
            };

            let pct = target.battery.remaining_percent;
            if pct < self.min_battery {
                continue;
            }

            // Non-linear weighting: reward full packs, penalise low ones.
            let mut weight = pct;
            if pct > 80.0 {
                weight *= 1.2;
            } else if pct < 30.0 {
                weight *= 0.8;
            }
            let weight = weight.clamp(1.0, 100.0) as u32;

            weights.push(EndpointWeight {
                endpoint: ep.clone(),
                weight,
                priority: 0,
                reason: format!("battery: {pct:.1}%, voltage: {:.2}V", target.battery.voltage),
            });
        }

        if weights.is_empty() {
            return Err(StrategyError::NoEligibleEndpoints(format!(
                "no endpoints with battery >= {:.1}%",
                self.min_battery
            )));
        }
        Ok(weights)
    }
}

/// Weighted sum over sub-strategies, aggregated per pod IP.
///
/// A failing sub-strategy is skipped rather than propagated; the composite
/// fails only when nothing survives any sub-strategy.
pub struct Composite {
    strategies: Vec<Arc<dyn RoutingStrategy>>,
    weights: Vec<f64>,
}

impl Composite {
    /// Builds a composite; weights are normalised to sum 1, with a length
    /// mismatch replaced by uniform weights.
    pub fn new(strategies: Vec<Arc<dyn RoutingStrategy>>, weights: Vec<f64>) -> Result<Self> {
        let weights = crate::normalise_weights(strategies.len(), weights)?;
        Ok(Self {
            strategies,
            weights,
        })
    }
}

impl RoutingStrategy for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn compute_weights(
        &self,
        source_node: &str,
        source: &UavTelemetry,
        endpoints: &[Endpoint],
        telemetry: &HashMap<String, UavTelemetry>,
    ) -> Result<Vec<EndpointWeight>> {
        let mut totals: HashMap<String, f64> = HashMap::new();
        let mut reasons: HashMap<String, Vec<String>> = HashMap::new();

        for (strategy, weight) in self.strategies.iter().zip(&self.weights) {
            let sub = match strategy.compute_weights(source_node, source, endpoints, telemetry) {
                Ok(sub) => sub,
                Err(err) => {
                    debug!(
                        strategy = strategy.name(),
                        error = %err,
                        "sub-strategy failed, skipping"
                    );
                    continue;
                }
            };

            for ew in sub {
                *totals.entry(ew.endpoint.pod_ip.clone()).or_default() +=
                    f64::from(ew.weight) * weight;
                reasons.entry(ew.endpoint.pod_ip).or_default().push(format!(
                    "{}({:.0}%): {}",
                    strategy.name(),
                    weight * 100.0,
                    ew.reason
                ));
            }
        }

        if totals.is_empty() {
            return Err(StrategyError::NoEligibleEndpoints(
                "no endpoints accepted by any sub-strategy".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut weights = Vec::with_capacity(totals.len());
        for ep in endpoints {
            if !seen.insert(ep.pod_ip.as_str()) {
                continue;
            }
            let Some(total) = totals.get(&ep.pod_ip) else {
                continue;
            };
            weights.push(EndpointWeight {
                endpoint: ep.clone(),
                weight: total.clamp(1.0, 100.0) as u32,
                priority: 0,
                reason: format!(
                    "composite: [{}]",
                    reasons
                        .get(&ep.pod_ip)
                        .map(|r| r.join(", "))
                        .unwrap_or_default()
                ),
            });
        }
        Ok(weights)
    }
}
