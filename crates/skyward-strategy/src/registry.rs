//! Process-wide strategy registry.
//!
//! One name-keyed table per contract, populated during startup and read
//! thereafter. Registration is idempotent with last-write-wins; lookup of
//! an unregistered name is a configuration error the binaries treat as
//! fatal. [`clear`] exists solely to reset state between test cases.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::LazyLock;

use parking_lot::RwLock;

use crate::error::StrategyError;
use crate::placement::PlacementStrategy;
use crate::routing::RoutingStrategy;

static PLACEMENT: LazyLock<RwLock<HashMap<String, Arc<dyn PlacementStrategy>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

static ROUTING: LazyLock<RwLock<HashMap<String, Arc<dyn RoutingStrategy>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Registers a placement strategy under its name.
pub fn register_placement(strategy: Arc<dyn PlacementStrategy>) {
    PLACEMENT
        .write()
        .insert(strategy.name().to_string(), strategy);
}

/// Looks up a placement strategy by name.
pub fn placement(name: &str) -> Result<Arc<dyn PlacementStrategy>, StrategyError> {
    PLACEMENT
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| StrategyError::UnknownAlgorithm {
            name: name.to_string(),
            available: placement_names(),
        })
}

/// Lists registered placement strategy names, sorted.
pub fn placement_names() -> Vec<String> {
    let mut names: Vec<String> = PLACEMENT.read().keys().cloned().collect();
    names.sort();
    names
}

/// Registers a routing strategy under its name.
pub fn register_routing(strategy: Arc<dyn RoutingStrategy>) {
    ROUTING.write().insert(strategy.name().to_string(), strategy);
}

/// Looks up a routing strategy by name.
pub fn routing(name: &str) -> Result<Arc<dyn RoutingStrategy>, StrategyError> {
    ROUTING
        .read()
        .get(name)
        .cloned()
        .ok_or_else(|| StrategyError::UnknownAlgorithm {
            name: name.to_string(),
            available: routing_names(),
        })
}

/// Lists registered routing strategy names, sorted.
pub fn routing_names() -> Vec<String> {
    let mut names: Vec<String> = ROUTING.read().keys().cloned().collect();
    names.sort();
    names
}

/// Empties both tables. Test use only.
pub fn clear() {
    PLACEMENT.write().clear();
    ROUTING.write().clear();
}
