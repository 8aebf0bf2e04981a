//! Cluster-side workload records.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotation key carrying a per-item target latitude.
pub const ANNOTATION_TARGET_LAT: &str = "target-lat";
/// Annotation key carrying a per-item target longitude.
pub const ANNOTATION_TARGET_LON: &str = "target-lon";

/// A unit of pending work awaiting node assignment.
///
/// The record is externally owned; the decision plane reads the identity
/// fields and annotations and writes the node assignment exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub name: String,
    pub namespace: String,
    /// Controller responsible for placing this item.
    #[serde(default)]
    pub scheduler_name: String,
    /// Node the item is bound to; absent or empty until placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_node: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

impl WorkItem {
    /// True when the item awaits placement by the named controller.
    #[must_use]
    pub fn is_eligible(&self, scheduler_name: &str) -> bool {
        self.scheduler_name == scheduler_name && !self.is_assigned()
    }

    /// True once the item carries a node assignment.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.assigned_node.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// A reachable member of a service's backend set.
///
/// The node name is carried by copy; endpoints never reference the
/// telemetry cache directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub pod_name: String,
    pub pod_ip: String,
    pub node_name: String,
    pub namespace: String,
    pub service: String,
    pub port: u16,
}

/// A pod as the store reports it: identity plus node placement and address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
}

impl PodRecord {
    /// Store key: `namespace/name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// A service's endpoint aggregation: the addresses backing it and the
/// ports it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoints {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,
    #[serde(default)]
    pub ports: Vec<u16>,
}

impl ServiceEndpoints {
    /// Cache key: `namespace/name`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// One backend address within a service aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAddress {
    pub pod_name: String,
    pub pod_ip: String,
}

/// Status phase reported for a node's telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodePhase {
    Active,
    Error,
    Inactive,
    #[default]
    Unknown,
}

impl fmt::Display for NodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Error => "Error",
            Self::Inactive => "Inactive",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(scheduler: &str, assigned: Option<&str>) -> WorkItem {
        WorkItem {
            name: "task-1".to_string(),
            namespace: "default".to_string(),
            scheduler_name: scheduler.to_string(),
            assigned_node: assigned.map(String::from),
            annotations: HashMap::new(),
        }
    }

    #[test]
    fn eligibility_requires_matching_scheduler() {
        assert!(item("uav-scheduler", None).is_eligible("uav-scheduler"));
        assert!(!item("other", None).is_eligible("uav-scheduler"));
    }

    #[test]
    fn eligibility_requires_unassigned() {
        assert!(!item("uav-scheduler", Some("uav-01")).is_eligible("uav-scheduler"));
        // An empty assignment counts as unassigned.
        assert!(item("uav-scheduler", Some("")).is_eligible("uav-scheduler"));
    }

    #[test]
    fn service_key_joins_namespace_and_name() {
        let svc = ServiceEndpoints {
            namespace: "default".to_string(),
            name: "video-feed".to_string(),
            addresses: vec![],
            ports: vec![8080],
        };
        assert_eq!(svc.key(), "default/video-feed");
    }

    #[test]
    fn phase_display_matches_wire_names() {
        assert_eq!(NodePhase::Active.to_string(), "Active");
        assert_eq!(NodePhase::Unknown.to_string(), "Unknown");
    }
}
