//! The cluster store contract.

use async_trait::async_trait;
use skyward_model::{NodePhase, PodRecord, ServiceEndpoints, UavTelemetry, WorkItem};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::config::RetryPolicy;
use crate::error::{Result, StoreError};

/// Change event for a work item in the unplaced watch set.
#[derive(Debug, Clone)]
pub struct WorkItemEvent {
    pub kind: EventKind,
    pub item: WorkItem,
}

/// Kind of change a watch event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// Content-free marker that pod or service-endpoint records changed.
///
/// Consumers respond by re-listing; since the event carries no payload,
/// a burst of them coalesces into a single rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyEvent {
    PodsChanged,
    EndpointsChanged,
}

/// Typed access to named records in the cluster store.
///
/// Watch streams are `mpsc` receivers: the sender side lives in a backend
/// task, and a closed channel is the `StreamClosed` signal after which the
/// caller re-subscribes.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Retry policy applied by [`upsert_telemetry_with_retry`].
    ///
    /// [`upsert_telemetry_with_retry`]: ClusterStore::upsert_telemetry_with_retry
    fn retry_policy(&self) -> RetryPolicy;

    /// Creates the record if absent, else replaces it under the current
    /// version token. A stale token fails with [`StoreError::Conflict`].
    async fn upsert_telemetry(&self, record: &UavTelemetry) -> Result<()>;

    async fn get_telemetry(&self, node_name: &str) -> Result<UavTelemetry>;

    /// Lists all telemetry records in the namespace, skipping records that
    /// fail to decode or validate.
    async fn list_telemetry(&self) -> Result<Vec<UavTelemetry>>;

    async fn delete_telemetry(&self, node_name: &str) -> Result<()>;

    /// Writes the `status` subobject. Callers treat failure as
    /// log-and-continue, never fatal.
    async fn update_status(&self, node_name: &str, phase: NodePhase) -> Result<()>;

    async fn put_work_item(&self, item: &WorkItem) -> Result<()>;

    async fn get_work_item(&self, namespace: &str, name: &str) -> Result<WorkItem>;

    /// Atomically assigns the work item to a node. At most one bind ever
    /// succeeds per item; later attempts fail with [`StoreError::Conflict`].
    async fn bind(&self, namespace: &str, name: &str, node_name: &str) -> Result<()>;

    /// Streams change events for work items in the namespace whose
    /// assigned-node field is empty. Current unplaced items are replayed
    /// as `Added` on subscription.
    async fn watch_unplaced(&self, namespace: &str) -> Result<UnboundedReceiver<WorkItemEvent>>;

    async fn put_pod(&self, pod: &PodRecord) -> Result<()>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_pods(&self) -> Result<Vec<PodRecord>>;

    async fn put_service_endpoints(&self, endpoints: &ServiceEndpoints) -> Result<()>;

    async fn delete_service_endpoints(&self, namespace: &str, name: &str) -> Result<()>;

    async fn list_service_endpoints(&self) -> Result<Vec<ServiceEndpoints>>;

    /// Streams change markers for pod and service-endpoint records.
    async fn watch_topology(&self) -> Result<UnboundedReceiver<TopologyEvent>>;

    /// Upserts with the configured retry policy. Cancellation aborts
    /// immediately; the last error is surfaced on exhaustion.
    async fn upsert_telemetry_with_retry(
        &self,
        record: &UavTelemetry,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let policy = self.retry_policy();
        let mut last_err = None;

        for attempt in 0..=policy.attempts {
            if attempt > 0 {
                tokio::select! {
                    () = cancel.cancelled() => return Err(StoreError::Cancelled),
                    () = tokio::time::sleep(policy.delay) => {}
                }
            }

            match self.upsert_telemetry(record).await {
                Ok(()) => return Ok(()),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err.unwrap_or_else(|| StoreError::Transport("no attempts made".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parking_lot::Mutex;
    use skyward_model::{BatteryData, GpsData};
    use std::time::Duration;

    /// Store whose upserts fail a configurable number of times.
    struct FlakyStore {
        failures_remaining: Mutex<u32>,
        calls: Mutex<u32>,
    }

    impl FlakyStore {
        fn failing(times: u32) -> Self {
            Self {
                failures_remaining: Mutex::new(times),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ClusterStore for FlakyStore {
        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(10),
            }
        }

        async fn upsert_telemetry(&self, _record: &UavTelemetry) -> Result<()> {
            *self.calls.lock() += 1;
            let mut remaining = self.failures_remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Transport("connection reset".to_string()));
            }
            Ok(())
        }

        async fn get_telemetry(&self, node_name: &str) -> Result<UavTelemetry> {
            Err(StoreError::NotFound(node_name.to_string()))
        }

        async fn list_telemetry(&self) -> Result<Vec<UavTelemetry>> {
            Ok(vec![])
        }

        async fn delete_telemetry(&self, _node_name: &str) -> Result<()> {
            Ok(())
        }

        async fn update_status(&self, _node_name: &str, _phase: NodePhase) -> Result<()> {
            Ok(())
        }

        async fn put_work_item(&self, _item: &WorkItem) -> Result<()> {
            Ok(())
        }

        async fn get_work_item(&self, namespace: &str, name: &str) -> Result<WorkItem> {
            Err(StoreError::NotFound(format!("{namespace}/{name}")))
        }

        async fn bind(&self, _namespace: &str, _name: &str, _node_name: &str) -> Result<()> {
            Ok(())
        }

        async fn watch_unplaced(
            &self,
            _namespace: &str,
        ) -> Result<UnboundedReceiver<WorkItemEvent>> {
            Err(StoreError::StreamClosed)
        }

        async fn put_pod(&self, _pod: &PodRecord) -> Result<()> {
            Ok(())
        }

        async fn delete_pod(&self, _namespace: &str, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn list_pods(&self) -> Result<Vec<PodRecord>> {
            Ok(vec![])
        }

        async fn put_service_endpoints(&self, _endpoints: &ServiceEndpoints) -> Result<()> {
            Ok(())
        }

        async fn delete_service_endpoints(&self, _namespace: &str, _name: &str) -> Result<()> {
            Ok(())
        }

        async fn list_service_endpoints(&self) -> Result<Vec<ServiceEndpoints>> {
            Ok(vec![])
        }

        async fn watch_topology(&self) -> Result<UnboundedReceiver<TopologyEvent>> {
            Err(StoreError::StreamClosed)
        }
    }

    fn record() -> UavTelemetry {
        UavTelemetry {
            node_name: "uav-01".to_string(),
            gps: GpsData {
                latitude: 0.0,
                longitude: 0.0,
                altitude: 0.0,
                heading: 0.0,
                speed: 0.0,
                satellites: 8,
                accuracy: 3.0,
                last_update: Utc::now(),
            },
            battery: BatteryData {
                remaining_percent: 50.0,
                voltage: 11.1,
                current: 0.0,
                temperature: 25.0,
                time_remaining_secs: 0,
                cycle_count: 0,
            },
            flight: None,
            network: None,
            performance: None,
            health: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let store = FlakyStore::failing(2);
        let cancel = CancellationToken::new();

        store
            .upsert_telemetry_with_retry(&record(), &cancel)
            .await
            .unwrap();
        assert_eq!(*store.calls.lock(), 3);
    }

    #[tokio::test]
    async fn retry_surfaces_last_error_on_exhaustion() {
        let store = FlakyStore::failing(10);
        let cancel = CancellationToken::new();

        let err = store
            .upsert_telemetry_with_retry(&record(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        // attempts = 2 means three calls total.
        assert_eq!(*store.calls.lock(), 3);
    }

    #[tokio::test]
    async fn retry_aborts_on_cancellation() {
        let store = FlakyStore::failing(10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store
            .upsert_telemetry_with_retry(&record(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        // First attempt runs before the cancellation check.
        assert_eq!(*store.calls.lock(), 1);
    }
}
