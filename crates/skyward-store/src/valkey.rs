//! Valkey-backed store backend.
//!
//! Records are JSON documents under namespaced keys. Telemetry upserts go
//! through a Lua compare-and-swap on the version embedded in the document;
//! the work-item binding is a `SET NX` on a dedicated binding key, which
//! gives the at-most-once guarantee without a transaction.
//!
//! Valkey has no native watch, so both watch streams are poll-and-diff
//! loops. A poll failure ends the stream; callers observe the closed
//! channel as `StreamClosed` and re-subscribe.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{cmd, AsyncCommands, Script};
use deadpool_redis::{Config, Pool, Runtime};
use skyward_model::{NodePhase, PodRecord, ServiceEndpoints, UavTelemetry, WorkItem};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::config::{RetryPolicy, StoreConfig};
use crate::error::{Result, StoreError};
use crate::record::{decode, encode, resource_name, RecordStatus, StoredRecord};
use crate::traits::{ClusterStore, EventKind, TopologyEvent, WorkItemEvent};

/// Compare-and-swap on the version embedded in the stored document.
/// ARGV[1] is the expected version ('0' for create), ARGV[2] the new
/// document. Returns 1 when applied, 0 on a stale token.
static UPSERT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
local cur = redis.call('GET', KEYS[1])
if not cur then
  if ARGV[1] == '0' then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
  end
  return 0
end
local ver = cjson.decode(cur)['version']
if ver == nil then ver = 0 end
if tostring(ver) ~= ARGV[1] then
  return 0
end
redis.call('SET', KEYS[1], ARGV[2])
return 1
",
    )
});

/// Valkey implementation of [`ClusterStore`].
pub struct ValkeyStore {
    pool: Pool,
    namespace: String,
    retry: RetryPolicy,
    watch_poll_interval: Duration,
    topology_resync: Duration,
}

impl ValkeyStore {
    /// Connects to the store and smoke-tests the connection.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool_config = Config::from_url(&config.url);
        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Config(e.to_string()))?;

        let mut conn = pool.get().await.map_err(StoreError::transport)?;
        let _: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::transport)?;

        Ok(Self {
            pool,
            namespace: config.namespace.clone(),
            retry: config.retry,
            watch_poll_interval: config.watch_poll_interval,
            topology_resync: config.topology_resync,
        })
    }

    fn telemetry_key(&self, node_name: &str) -> String {
        format!(
            "skyward:{}:telemetry:{}",
            self.namespace,
            resource_name(node_name)
        )
    }

    fn telemetry_pattern(&self) -> String {
        format!("skyward:{}:telemetry:*", self.namespace)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(StoreError::transport)
    }

    /// Reads the current document, applies `update`, and writes it back
    /// under the current version token.
    async fn swap_record<F>(&self, node_name: &str, update: F) -> Result<()>
    where
        F: FnOnce(Option<StoredRecord>) -> Result<StoredRecord>,
    {
        let key = self.telemetry_key(node_name);
        let mut conn = self.conn().await?;

        let raw: Option<String> = conn.get(&key).await.map_err(StoreError::transport)?;
        let current = raw.as_deref().map(decode).transpose()?;
        let expected = current.as_ref().map_or(0, |r| r.version);

        let next = update(current)?;
        let payload = encode(&next)?;

        let applied: i64 = UPSERT_SCRIPT
            .key(&key)
            .arg(expected.to_string())
            .arg(&payload)
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::transport)?;

        if applied == 0 {
            return Err(StoreError::Conflict(format!(
                "version token {expected} is stale for {}",
                resource_name(node_name)
            )));
        }
        Ok(())
    }
}

fn work_item_key(namespace: &str, name: &str) -> String {
    format!("skyward:{namespace}:workitem:{name}")
}

fn binding_key(namespace: &str, name: &str) -> String {
    format!("skyward:{namespace}:binding:{name}")
}

fn pod_key(namespace: &str, name: &str) -> String {
    format!("skyward:pods:{namespace}/{name}")
}

fn endpoints_key(namespace: &str, name: &str) -> String {
    format!("skyward:endpoints:{namespace}/{name}")
}

async fn get_conn(pool: &Pool) -> Result<deadpool_redis::Connection> {
    pool.get().await.map_err(StoreError::transport)
}

/// Lists `(key, value)` pairs for every key matching the pattern.
async fn list_entries(pool: &Pool, pattern: &str) -> Result<Vec<(String, String)>> {
    let mut conn = get_conn(pool).await?;
    let keys: Vec<String> = cmd("KEYS")
        .arg(pattern)
        .query_async(&mut conn)
        .await
        .map_err(StoreError::transport)?;

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let value: Option<String> = conn.get(&key).await.map_err(StoreError::transport)?;
        if let Some(value) = value {
            entries.push((key, value));
        }
    }
    Ok(entries)
}

/// Snapshot of unplaced work items in a namespace, keyed by store key.
async fn snapshot_unplaced(pool: &Pool, namespace: &str) -> Result<HashMap<String, String>> {
    let pattern = format!("skyward:{namespace}:workitem:*");
    let mut snapshot = HashMap::new();
    for (key, raw) in list_entries(pool, &pattern).await? {
        match serde_json::from_str::<WorkItem>(&raw) {
            Ok(item) if !item.is_assigned() => {
                snapshot.insert(key, raw);
            }
            Ok(_) => {}
            Err(err) => debug!(key = %key, error = %err, "skipping undecodable work item"),
        }
    }
    Ok(snapshot)
}

fn send_item_event(
    tx: &UnboundedSender<WorkItemEvent>,
    kind: EventKind,
    raw: &str,
) -> std::result::Result<(), ()> {
    match serde_json::from_str::<WorkItem>(raw) {
        Ok(item) => tx.send(WorkItemEvent { kind, item }).map_err(|_| ()),
        Err(_) => Ok(()),
    }
}

#[async_trait]
impl ClusterStore for ValkeyStore {
    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn upsert_telemetry(&self, record: &UavTelemetry) -> Result<()> {
        record.validate()?;
        let spec = record.clone();
        self.swap_record(&record.node_name, move |current| {
            let (status, version) = current.map_or((None, 0), |r| (r.status, r.version));
            Ok(StoredRecord {
                spec,
                status,
                version: version + 1,
            })
        })
        .await
    }

    async fn get_telemetry(&self, node_name: &str) -> Result<UavTelemetry> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(self.telemetry_key(node_name))
            .await
            .map_err(StoreError::transport)?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(resource_name(node_name)))?;
        Ok(decode(&raw)?.spec)
    }

    async fn list_telemetry(&self) -> Result<Vec<UavTelemetry>> {
        let entries = list_entries(&self.pool, &self.telemetry_pattern()).await?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, raw) in entries {
            match decode(&raw) {
                Ok(record) if record.spec.validate().is_ok() => records.push(record.spec),
                Ok(_) | Err(_) => {
                    debug!(key = %key, "skipping invalid telemetry record");
                }
            }
        }
        Ok(records)
    }

    async fn delete_telemetry(&self, node_name: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .del(self.telemetry_key(node_name))
            .await
            .map_err(StoreError::transport)?;
        if removed == 0 {
            return Err(StoreError::NotFound(resource_name(node_name)));
        }
        Ok(())
    }

    async fn update_status(&self, node_name: &str, phase: NodePhase) -> Result<()> {
        self.swap_record(node_name, move |current| {
            let mut record =
                current.ok_or_else(|| StoreError::NotFound(resource_name(node_name)))?;
            record.status = Some(RecordStatus::now(phase));
            record.version += 1;
            Ok(record)
        })
        .await
    }

    async fn put_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(item).map_err(StoreError::serialisation)?;
        conn.set::<_, _, ()>(work_item_key(&item.namespace, &item.name), payload)
            .await
            .map_err(StoreError::transport)?;
        Ok(())
    }

    async fn get_work_item(&self, namespace: &str, name: &str) -> Result<WorkItem> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = conn
            .get(work_item_key(namespace, name))
            .await
            .map_err(StoreError::transport)?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))?;
        serde_json::from_str(&raw).map_err(StoreError::serialisation)
    }

    async fn bind(&self, namespace: &str, name: &str, node_name: &str) -> Result<()> {
        let mut conn = self.conn().await?;

        let item_key = work_item_key(namespace, name);
        let raw: Option<String> = conn.get(&item_key).await.map_err(StoreError::transport)?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))?;
        let mut item: WorkItem = serde_json::from_str(&raw).map_err(StoreError::serialisation)?;
        if item.is_assigned() {
            return Err(StoreError::Conflict(format!(
                "work item {namespace}/{name} is already bound"
            )));
        }

        let claimed: Option<String> = cmd("SET")
            .arg(binding_key(namespace, name))
            .arg(node_name)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::transport)?;
        if claimed.is_none() {
            return Err(StoreError::Conflict(format!(
                "work item {namespace}/{name} is already bound"
            )));
        }

        item.assigned_node = Some(node_name.to_string());
        let payload = serde_json::to_string(&item).map_err(StoreError::serialisation)?;
        conn.set::<_, _, ()>(&item_key, payload)
            .await
            .map_err(StoreError::transport)?;
        Ok(())
    }

    async fn watch_unplaced(&self, namespace: &str) -> Result<UnboundedReceiver<WorkItemEvent>> {
        let (tx, rx) = unbounded_channel();
        let pool = self.pool.clone();
        let namespace = namespace.to_string();
        let poll = self.watch_poll_interval;

        tokio::spawn(async move {
            let mut known: HashMap<String, String> = HashMap::new();
            let mut ticker = tokio::time::interval(poll);
            loop {
                ticker.tick().await;

                let snapshot = match snapshot_unplaced(&pool, &namespace).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(error = %err, "work item poll failed, closing watch stream");
                        return;
                    }
                };

                for (key, raw) in &snapshot {
                    let kind = match known.get(key) {
                        None => Some(EventKind::Added),
                        Some(prev) if prev != raw => Some(EventKind::Modified),
                        Some(_) => None,
                    };
                    if let Some(kind) = kind {
                        if send_item_event(&tx, kind, raw).is_err() {
                            return;
                        }
                    }
                }
                for (key, raw) in &known {
                    if !snapshot.contains_key(key)
                        && send_item_event(&tx, EventKind::Deleted, raw).is_err()
                    {
                        return;
                    }
                }
                known = snapshot;
            }
        });

        Ok(rx)
    }

    async fn put_pod(&self, pod: &PodRecord) -> Result<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(pod).map_err(StoreError::serialisation)?;
        conn.set::<_, _, ()>(pod_key(&pod.namespace, &pod.name), payload)
            .await
            .map_err(StoreError::transport)?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .del(pod_key(namespace, name))
            .await
            .map_err(StoreError::transport)?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("{namespace}/{name}")));
        }
        Ok(())
    }

    async fn list_pods(&self) -> Result<Vec<PodRecord>> {
        let entries = list_entries(&self.pool, "skyward:pods:*").await?;
        Ok(entries
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_str(&raw).ok())
            .collect())
    }

    async fn put_service_endpoints(&self, endpoints: &ServiceEndpoints) -> Result<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(endpoints).map_err(StoreError::serialisation)?;
        conn.set::<_, _, ()>(
            endpoints_key(&endpoints.namespace, &endpoints.name),
            payload,
        )
        .await
        .map_err(StoreError::transport)?;
        Ok(())
    }

    async fn delete_service_endpoints(&self, namespace: &str, name: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn
            .del(endpoints_key(namespace, name))
            .await
            .map_err(StoreError::transport)?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("{namespace}/{name}")));
        }
        Ok(())
    }

    async fn list_service_endpoints(&self) -> Result<Vec<ServiceEndpoints>> {
        let entries = list_entries(&self.pool, "skyward:endpoints:*").await?;
        Ok(entries
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_str(&raw).ok())
            .collect())
    }

    async fn watch_topology(&self) -> Result<UnboundedReceiver<TopologyEvent>> {
        let (tx, rx) = unbounded_channel();
        let pool = self.pool.clone();
        let resync = self.topology_resync;

        tokio::spawn(async move {
            let mut pods_seen: Option<Vec<(String, String)>> = None;
            let mut endpoints_seen: Option<Vec<(String, String)>> = None;
            let mut ticker = tokio::time::interval(resync);
            loop {
                ticker.tick().await;

                let (pods, endpoints) = match (
                    list_entries(&pool, "skyward:pods:*").await,
                    list_entries(&pool, "skyward:endpoints:*").await,
                ) {
                    (Ok(mut pods), Ok(mut endpoints)) => {
                        pods.sort();
                        endpoints.sort();
                        (pods, endpoints)
                    }
                    (Err(err), _) | (_, Err(err)) => {
                        warn!(error = %err, "topology poll failed, closing watch stream");
                        return;
                    }
                };

                if pods_seen.as_ref().is_some_and(|seen| *seen != pods)
                    && tx.send(TopologyEvent::PodsChanged).is_err()
                {
                    return;
                }
                if endpoints_seen.as_ref().is_some_and(|seen| *seen != endpoints)
                    && tx.send(TopologyEvent::EndpointsChanged).is_err()
                {
                    return;
                }
                pods_seen = Some(pods);
                endpoints_seen = Some(endpoints);
            }
        });

        Ok(rx)
    }
}
