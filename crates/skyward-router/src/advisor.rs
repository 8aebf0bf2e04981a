//! The routing advisor core: dual cache plus local query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use skyward_model::{Endpoint, UavTelemetry};
use skyward_store::ClusterStore;
use skyward_strategy::{EndpointWeight, RoutingStrategy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RouterError};

/// Telemetry mirror refresh period.
const TELEMETRY_REFRESH: Duration = Duration::from_secs(2);

/// Backoff before re-subscribing a closed topology stream.
const TOPOLOGY_RESUBSCRIBE: Duration = Duration::from_secs(30);

/// Deadline for the telemetry cache to receive its first entry.
const CACHE_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll period while waiting for cache readiness.
const CACHE_READY_POLL: Duration = Duration::from_millis(500);

/// Per-node routing advisor.
///
/// Owns two caches under separate locks. Writers are the two background
/// refresh loops; readers snapshot under the lock and never hold it
/// across a strategy call.
pub struct RoutingAdvisor {
    node_name: String,
    store: Arc<dyn ClusterStore>,
    strategy: Arc<dyn RoutingStrategy>,
    telemetry: RwLock<HashMap<String, UavTelemetry>>,
    endpoints: RwLock<HashMap<String, Vec<Endpoint>>>,
}

/// Cache occupancy snapshot for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub metrics_cached: usize,
    pub services_cached: usize,
    pub node_name: String,
    pub algorithm: String,
}

impl RoutingAdvisor {
    #[must_use]
    pub fn new(
        node_name: String,
        store: Arc<dyn ClusterStore>,
        strategy: Arc<dyn RoutingStrategy>,
    ) -> Self {
        Self {
            node_name,
            store,
            strategy,
            telemetry: RwLock::new(HashMap::new()),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Name of the configured routing strategy.
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.strategy.name()
    }

    /// Node this advisor runs on.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Spawns the refresh loops and returns once the telemetry cache has
    /// at least one entry, or fails with [`RouterError::CacheInitTimeout`].
    pub async fn start(self: Arc<Self>, cancel: CancellationToken) -> Result<()> {
        info!(
            node = %self.node_name,
            algorithm = self.strategy.name(),
            "starting routing advisor"
        );

        let telemetry_loop = self.clone();
        let telemetry_cancel = cancel.clone();
        tokio::spawn(async move {
            telemetry_loop.refresh_telemetry_loop(telemetry_cancel).await;
        });

        let endpoint_loop = self.clone();
        let endpoint_cancel = cancel.clone();
        tokio::spawn(async move {
            endpoint_loop.refresh_endpoints_loop(endpoint_cancel).await;
        });

        self.wait_for_cache_ready(&cancel).await?;
        info!("routing advisor started");
        Ok(())
    }

    /// Computes traffic weights for the named service.
    ///
    /// Reads consistent snapshots of both caches, releases the locks, and
    /// hands the copies to the strategy. Strategy errors propagate
    /// unchanged.
    pub fn compute_routing(&self, service: &str) -> Result<Vec<EndpointWeight>> {
        let (source, snapshot) = {
            let cache = self.telemetry.read();
            (cache.get(&self.node_name).cloned(), cache.clone())
        };
        let source = source.ok_or_else(|| RouterError::SourceUnknown(self.node_name.clone()))?;

        let endpoints = { self.endpoints.read().get(service).cloned() };
        let endpoints = endpoints
            .filter(|eps| !eps.is_empty())
            .ok_or_else(|| RouterError::NoEndpoints(service.to_string()))?;

        let weights =
            self.strategy
                .compute_weights(&self.node_name, &source, &endpoints, &snapshot)?;

        debug!(
            service,
            algorithm = self.strategy.name(),
            endpoints = weights.len(),
            "routing computed"
        );
        Ok(weights)
    }

    /// Current cache occupancy.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            metrics_cached: self.telemetry.read().len(),
            services_cached: self.endpoints.read().len(),
            node_name: self.node_name.clone(),
            algorithm: self.strategy.name().to_string(),
        }
    }

    async fn refresh_telemetry_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(TELEMETRY_REFRESH);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => match self.store.list_telemetry().await {
                    Ok(records) => {
                        let map: HashMap<String, UavTelemetry> = records
                            .into_iter()
                            .map(|r| (r.node_name.clone(), r))
                            .collect();
                        let count = map.len();
                        // Atomic swap: readers see the old or the new map,
                        // never a partial one.
                        *self.telemetry.write() = map;
                        debug!(count, "telemetry cache updated");
                    }
                    Err(err) => warn!(error = %err, "failed to list telemetry"),
                },
            }
        }
    }

    async fn refresh_endpoints_loop(self: Arc<Self>, cancel: CancellationToken) {
        self.rebuild_endpoints().await;

        loop {
            let mut events = match self.store.watch_topology().await {
                Ok(events) => events,
                Err(err) => {
                    warn!(error = %err, "topology watch failed, retrying");
                    tokio::select! {
                        () = cancel.cancelled() => return,
                        () = tokio::time::sleep(TOPOLOGY_RESUBSCRIBE) => continue,
                    }
                }
            };

            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    event = events.recv() => {
                        if event.is_none() {
                            warn!("topology stream closed, resubscribing");
                            break;
                        }
                        // Drain whatever queued up so a burst of events
                        // costs at most one extra rebuild.
                        while events.try_recv().is_ok() {}
                        self.rebuild_endpoints().await;
                    }
                }
            }
        }
    }

    /// Full sweep: list pods for the pod-to-node mapping, list service
    /// aggregates, join, and swap the cache.
    async fn rebuild_endpoints(&self) {
        let pods = match self.store.list_pods().await {
            Ok(pods) => pods,
            Err(err) => {
                warn!(error = %err, "failed to list pods");
                return;
            }
        };
        let services = match self.store.list_service_endpoints().await {
            Ok(services) => services,
            Err(err) => {
                warn!(error = %err, "failed to list service endpoints");
                return;
            }
        };

        let pod_to_node: HashMap<String, String> = pods
            .iter()
            .filter_map(|p| p.node_name.clone().map(|node| (p.key(), node)))
            .collect();

        let mut cache: HashMap<String, Vec<Endpoint>> = HashMap::new();
        for svc in services {
            let mut endpoints = Vec::new();
            for addr in &svc.addresses {
                let pod_key = format!("{}/{}", svc.namespace, addr.pod_name);
                let Some(node_name) = pod_to_node.get(&pod_key) else {
                    continue;
                };
                for port in &svc.ports {
                    endpoints.push(Endpoint {
                        pod_name: addr.pod_name.clone(),
                        pod_ip: addr.pod_ip.clone(),
                        node_name: node_name.clone(),
                        namespace: svc.namespace.clone(),
                        service: svc.name.clone(),
                        port: *port,
                    });
                }
            }
            if !endpoints.is_empty() {
                cache.insert(svc.key(), endpoints);
            }
        }

        let count = cache.len();
        *self.endpoints.write() = cache;
        debug!(services = count, "endpoint cache rebuilt");
    }

    async fn wait_for_cache_ready(&self, cancel: &CancellationToken) -> Result<()> {
        let deadline = tokio::time::sleep(CACHE_INIT_TIMEOUT);
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(CACHE_READY_POLL);

        loop {
            tokio::select! {
                () = &mut deadline => return Err(RouterError::CacheInitTimeout),
                () = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    if !self.telemetry.read().is_empty() {
                        info!("cache ready");
                        return Ok(());
                    }
                }
            }
        }
    }
}
