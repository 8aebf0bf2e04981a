//! In-memory store backend.
//!
//! Backs tests and single-process deployments. Watch subscribers are
//! plain channel senders registered under the store's write lock; a
//! dropped receiver is pruned on the next notification.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use skyward_model::{NodePhase, PodRecord, ServiceEndpoints, UavTelemetry, WorkItem};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::config::RetryPolicy;
use crate::error::{Result, StoreError};
use crate::record::{resource_name, RecordStatus, StoredRecord};
use crate::traits::{ClusterStore, EventKind, TopologyEvent, WorkItemEvent};

/// In-memory implementation of [`ClusterStore`].
pub struct MemoryStore {
    retry: RetryPolicy,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    telemetry: HashMap<String, StoredRecord>,
    work_items: HashMap<String, WorkItem>,
    pods: HashMap<String, PodRecord>,
    endpoints: HashMap<String, ServiceEndpoints>,
    item_watchers: Vec<ItemWatcher>,
    topology_watchers: Vec<UnboundedSender<TopologyEvent>>,
}

struct ItemWatcher {
    namespace: String,
    sender: UnboundedSender<WorkItemEvent>,
}

impl MemoryStore {
    /// Creates an empty store with the given retry policy.
    #[must_use]
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn notify_items(inner: &mut Inner, namespace: &str, event: &WorkItemEvent) {
        inner
            .item_watchers
            .retain(|w| w.namespace != namespace || w.sender.send(event.clone()).is_ok());
    }

    fn notify_topology(inner: &mut Inner, event: TopologyEvent) {
        inner.topology_watchers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

fn item_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[async_trait]
impl ClusterStore for MemoryStore {
    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn upsert_telemetry(&self, record: &UavTelemetry) -> Result<()> {
        record.validate()?;

        let mut inner = self.inner.write();
        match inner.telemetry.get_mut(&record.node_name) {
            Some(existing) => {
                existing.spec = record.clone();
                existing.version += 1;
            }
            None => {
                inner.telemetry.insert(
                    record.node_name.clone(),
                    StoredRecord {
                        spec: record.clone(),
                        status: None,
                        version: 1,
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_telemetry(&self, node_name: &str) -> Result<UavTelemetry> {
        self.inner
            .read()
            .telemetry
            .get(node_name)
            .map(|r| r.spec.clone())
            .ok_or_else(|| StoreError::NotFound(resource_name(node_name)))
    }

    async fn list_telemetry(&self) -> Result<Vec<UavTelemetry>> {
        Ok(self
            .inner
            .read()
            .telemetry
            .values()
            .filter(|r| r.spec.validate().is_ok())
            .map(|r| r.spec.clone())
            .collect())
    }

    async fn delete_telemetry(&self, node_name: &str) -> Result<()> {
        self.inner
            .write()
            .telemetry
            .remove(node_name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(resource_name(node_name)))
    }

    async fn update_status(&self, node_name: &str, phase: NodePhase) -> Result<()> {
        let mut inner = self.inner.write();
        let record = inner
            .telemetry
            .get_mut(node_name)
            .ok_or_else(|| StoreError::NotFound(resource_name(node_name)))?;
        record.status = Some(RecordStatus::now(phase));
        record.version += 1;
        Ok(())
    }

    async fn put_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut inner = self.inner.write();
        let key = item_key(&item.namespace, &item.name);
        let existed = inner.work_items.insert(key, item.clone()).is_some();

        if !item.is_assigned() {
            let kind = if existed {
                EventKind::Modified
            } else {
                EventKind::Added
            };
            let event = WorkItemEvent {
                kind,
                item: item.clone(),
            };
            Self::notify_items(&mut inner, &item.namespace, &event);
        }
        Ok(())
    }

    async fn get_work_item(&self, namespace: &str, name: &str) -> Result<WorkItem> {
        self.inner
            .read()
            .work_items
            .get(&item_key(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(item_key(namespace, name)))
    }

    async fn bind(&self, namespace: &str, name: &str, node_name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let key = item_key(namespace, name);

        let unplaced = match inner.work_items.get_mut(&key) {
            None => return Err(StoreError::NotFound(key)),
            Some(item) => {
                if item.is_assigned() {
                    return Err(StoreError::Conflict(format!(
                        "work item {key} is already bound"
                    )));
                }
                let unplaced = item.clone();
                item.assigned_node = Some(node_name.to_string());
                unplaced
            }
        };

        // The item leaves the unplaced watch set. Surface that as DELETED
        // carrying the last unassigned payload; assigned items never
        // appear on this stream.
        let event = WorkItemEvent {
            kind: EventKind::Deleted,
            item: unplaced,
        };
        Self::notify_items(&mut inner, namespace, &event);
        Ok(())
    }

    async fn watch_unplaced(&self, namespace: &str) -> Result<UnboundedReceiver<WorkItemEvent>> {
        let (tx, rx) = unbounded_channel();
        let mut inner = self.inner.write();

        // Replay the current unplaced set as ADDED, in name order.
        let mut current: Vec<&WorkItem> = inner
            .work_items
            .values()
            .filter(|i| i.namespace == namespace && !i.is_assigned())
            .collect();
        current.sort_by(|a, b| a.name.cmp(&b.name));
        for item in current {
            let _ = tx.send(WorkItemEvent {
                kind: EventKind::Added,
                item: item.clone(),
            });
        }

        inner.item_watchers.push(ItemWatcher {
            namespace: namespace.to_string(),
            sender: tx,
        });
        Ok(rx)
    }

    async fn put_pod(&self, pod: &PodRecord) -> Result<()> {
        let mut inner = self.inner.write();
        inner.pods.insert(pod.key(), pod.clone());
        Self::notify_topology(&mut inner, TopologyEvent::PodsChanged);
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let removed = inner.pods.remove(&item_key(namespace, name));
        if removed.is_none() {
            return Err(StoreError::NotFound(item_key(namespace, name)));
        }
        Self::notify_topology(&mut inner, TopologyEvent::PodsChanged);
        Ok(())
    }

    async fn list_pods(&self) -> Result<Vec<PodRecord>> {
        Ok(self.inner.read().pods.values().cloned().collect())
    }

    async fn put_service_endpoints(&self, endpoints: &ServiceEndpoints) -> Result<()> {
        let mut inner = self.inner.write();
        inner.endpoints.insert(endpoints.key(), endpoints.clone());
        Self::notify_topology(&mut inner, TopologyEvent::EndpointsChanged);
        Ok(())
    }

    async fn delete_service_endpoints(&self, namespace: &str, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let removed = inner.endpoints.remove(&item_key(namespace, name));
        if removed.is_none() {
            return Err(StoreError::NotFound(item_key(namespace, name)));
        }
        Self::notify_topology(&mut inner, TopologyEvent::EndpointsChanged);
        Ok(())
    }

    async fn list_service_endpoints(&self) -> Result<Vec<ServiceEndpoints>> {
        Ok(self.inner.read().endpoints.values().cloned().collect())
    }

    async fn watch_topology(&self) -> Result<UnboundedReceiver<TopologyEvent>> {
        let (tx, rx) = unbounded_channel();
        self.inner.write().topology_watchers.push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use skyward_model::{BatteryData, EndpointAddress, GpsData};
    use std::collections::HashMap as StdHashMap;

    fn telemetry(node: &str, battery: f64) -> UavTelemetry {
        UavTelemetry {
            node_name: node.to_string(),
            gps: GpsData {
                latitude: 34.0,
                longitude: -118.0,
                altitude: 50.0,
                heading: 0.0,
                speed: 0.0,
                satellites: 8,
                accuracy: 2.0,
                last_update: Utc::now(),
            },
            battery: BatteryData {
                remaining_percent: battery,
                voltage: 11.5,
                current: -3.0,
                temperature: 24.0,
                time_remaining_secs: 1000,
                cycle_count: 10,
            },
            flight: None,
            network: None,
            performance: None,
            health: None,
            metadata: None,
        }
    }

    fn work_item(namespace: &str, name: &str) -> WorkItem {
        WorkItem {
            name: name.to_string(),
            namespace: namespace.to_string(),
            scheduler_name: "uav-scheduler".to_string(),
            assigned_node: None,
            annotations: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn upsert_get_list_delete() {
        let store = MemoryStore::default();

        store.upsert_telemetry(&telemetry("uav-01", 70.0)).await.unwrap();
        store.upsert_telemetry(&telemetry("uav-02", 40.0)).await.unwrap();

        let fetched = store.get_telemetry("uav-01").await.unwrap();
        assert_eq!(fetched.battery.remaining_percent, 70.0);

        assert_eq!(store.list_telemetry().await.unwrap().len(), 2);

        store.delete_telemetry("uav-01").await.unwrap();
        assert!(matches!(
            store.get_telemetry("uav-01").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_telemetry("uav-01").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn upsert_bumps_version_and_keeps_status() {
        let store = MemoryStore::default();
        store.upsert_telemetry(&telemetry("uav-01", 70.0)).await.unwrap();
        store
            .update_status("uav-01", NodePhase::Active)
            .await
            .unwrap();
        store.upsert_telemetry(&telemetry("uav-01", 65.0)).await.unwrap();

        let inner = store.inner.read();
        let record = inner.telemetry.get("uav-01").unwrap();
        assert_eq!(record.version, 3);
        assert_eq!(record.status.as_ref().unwrap().phase, NodePhase::Active);
        assert_eq!(record.spec.battery.remaining_percent, 65.0);
    }

    #[tokio::test]
    async fn upsert_rejects_invalid_record() {
        let store = MemoryStore::default();
        let err = store
            .upsert_telemetry(&telemetry("uav-01", 140.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn list_skips_out_of_range_records() {
        let store = MemoryStore::default();
        store.upsert_telemetry(&telemetry("uav-01", 70.0)).await.unwrap();

        // Plant a stale record that has drifted out of range.
        {
            let mut inner = store.inner.write();
            let mut bad = telemetry("uav-02", 50.0);
            bad.gps.latitude = 120.0;
            inner.telemetry.insert(
                "uav-02".to_string(),
                StoredRecord {
                    spec: bad,
                    status: None,
                    version: 1,
                },
            );
        }

        let listed = store.list_telemetry().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].node_name, "uav-01");
    }

    #[tokio::test]
    async fn status_update_requires_existing_record() {
        let store = MemoryStore::default();
        assert!(matches!(
            store.update_status("ghost", NodePhase::Active).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn bind_is_at_most_once() {
        let store = MemoryStore::default();
        store.put_work_item(&work_item("default", "task-1")).await.unwrap();

        store.bind("default", "task-1", "uav-01").await.unwrap();
        let bound = store.get_work_item("default", "task-1").await.unwrap();
        assert_eq!(bound.assigned_node.as_deref(), Some("uav-01"));

        let err = store.bind("default", "task-1", "uav-02").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The first binding is untouched.
        let still = store.get_work_item("default", "task-1").await.unwrap();
        assert_eq!(still.assigned_node.as_deref(), Some("uav-01"));
    }

    #[tokio::test]
    async fn bind_unknown_item_is_not_found() {
        let store = MemoryStore::default();
        assert!(matches!(
            store.bind("default", "ghost", "uav-01").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn watch_replays_current_unplaced_items() {
        let store = MemoryStore::default();
        store.put_work_item(&work_item("default", "task-b")).await.unwrap();
        store.put_work_item(&work_item("default", "task-a")).await.unwrap();

        let mut bound = work_item("default", "task-c");
        bound.assigned_node = Some("uav-09".to_string());
        store.put_work_item(&bound).await.unwrap();

        let mut rx = store.watch_unplaced("default").await.unwrap();
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.kind, EventKind::Added);
        assert_eq!(first.item.name, "task-a");
        assert_eq!(second.item.name, "task-b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn watch_delivers_live_events_per_namespace() {
        let store = MemoryStore::default();
        let mut rx = store.watch_unplaced("default").await.unwrap();
        let mut other = store.watch_unplaced("other").await.unwrap();

        store.put_work_item(&work_item("default", "task-1")).await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Added);
        assert!(other.try_recv().is_err());

        // Re-putting the same unplaced item surfaces as MODIFIED.
        store.put_work_item(&work_item("default", "task-1")).await.unwrap();
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Modified);

        // Binding removes the item from the unplaced set; the stream
        // reports that as DELETED with the last unassigned payload.
        store.bind("default", "task-1", "uav-01").await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Deleted);
        assert!(!event.item.is_assigned());
    }

    #[tokio::test]
    async fn topology_watch_marks_pod_and_endpoint_changes() {
        let store = MemoryStore::default();
        let mut rx = store.watch_topology().await.unwrap();

        store
            .put_pod(&PodRecord {
                name: "feed-1".to_string(),
                namespace: "default".to_string(),
                node_name: Some("uav-01".to_string()),
                pod_ip: Some("10.0.0.1".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), TopologyEvent::PodsChanged);

        store
            .put_service_endpoints(&ServiceEndpoints {
                namespace: "default".to_string(),
                name: "video-feed".to_string(),
                addresses: vec![EndpointAddress {
                    pod_name: "feed-1".to_string(),
                    pod_ip: "10.0.0.1".to_string(),
                }],
                ports: vec![8080],
            })
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), TopologyEvent::EndpointsChanged);

        store
            .delete_service_endpoints("default", "video-feed")
            .await
            .unwrap();
        assert_eq!(rx.try_recv().unwrap(), TopologyEvent::EndpointsChanged);
    }
}
