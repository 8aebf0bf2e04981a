//! The placement control loop.

use std::cmp::Ordering;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use skyward_model::WorkItem;
use skyward_store::{ClusterStore, EventKind, StoreError};
use skyward_strategy::PlacementStrategy;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};

/// Fixed delay before re-subscribing after a closed or failed watch.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Candidates included in the placement log line.
const TOP_CANDIDATES_LOGGED: usize = 3;

/// The placement controller: watch, filter, score, bind.
#[derive(Clone)]
pub struct PlacementController {
    config: SchedulerConfig,
    store: Arc<dyn ClusterStore>,
    strategy: Arc<dyn PlacementStrategy>,
}

impl PlacementController {
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn ClusterStore>,
        strategy: Arc<dyn PlacementStrategy>,
    ) -> Self {
        Self {
            config,
            store,
            strategy,
        }
    }

    /// Runs the controller until the token is cancelled.
    ///
    /// A closed watch stream or a watch failure is retried with a fixed
    /// backoff; placement failures are logged and never retried, the
    /// cluster resurfaces the item.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(
            scheduler = %self.config.scheduler_name,
            algorithm = self.strategy.name(),
            namespace = %self.config.namespace,
            workers = self.config.worker_threads,
            "starting placement controller"
        );

        if self.config.worker_threads > 1 {
            self.run_partitioned(cancel).await
        } else {
            self.run_serial(cancel).await
        }
    }

    async fn run_serial(&self, cancel: CancellationToken) -> Result<()> {
        loop {
            match self.watch_and_schedule(&cancel, None).await {
                Ok(()) => {
                    info!("placement controller stopped");
                    return Ok(());
                }
                Err(err) => {
                    warn!(error = %err, "watch and schedule error, reconnecting");
                    tokio::select! {
                        () = cancel.cancelled() => {
                            info!("placement controller stopped");
                            return Ok(());
                        }
                        () = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    }
                }
            }
        }
    }

    /// Above one worker, items are partitioned by name hash so a single
    /// item is never evaluated twice concurrently.
    async fn run_partitioned(&self, cancel: CancellationToken) -> Result<()> {
        let mut senders = Vec::with_capacity(self.config.worker_threads);
        let mut handles = Vec::with_capacity(self.config.worker_threads);

        for index in 0..self.config.worker_threads {
            let (tx, mut rx) = unbounded_channel::<WorkItem>();
            senders.push(tx);

            let worker = self.clone();
            let worker_cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = worker_cancel.cancelled() => return,
                        item = rx.recv() => {
                            let Some(item) = item else { return };
                            if let Err(err) = worker.schedule_item(&item).await {
                                warn!(
                                    item = %item.name,
                                    worker = index,
                                    error = %err,
                                    "failed to place work item"
                                );
                            }
                        }
                    }
                }
            }));
        }

        let result = loop {
            match self.watch_and_schedule(&cancel, Some(senders.as_slice())).await {
                Ok(()) => break Ok(()),
                Err(err) => {
                    warn!(error = %err, "watch and schedule error, reconnecting");
                    tokio::select! {
                        () = cancel.cancelled() => break Ok(()),
                        () = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    }
                }
            }
        };

        drop(senders);
        for handle in handles {
            let _ = handle.await;
        }
        info!("placement controller stopped");
        result
    }

    /// Subscribes to the unplaced-item stream and evaluates events until
    /// cancellation or stream closure.
    async fn watch_and_schedule(
        &self,
        cancel: &CancellationToken,
        workers: Option<&[UnboundedSender<WorkItem>]>,
    ) -> Result<()> {
        let mut events = self.store.watch_unplaced(&self.config.namespace).await?;
        info!("watching for unplaced work items");

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(StoreError::StreamClosed.into());
                    };
                    if !matches!(event.kind, EventKind::Added | EventKind::Modified) {
                        continue;
                    }
                    // The store delivers every unplaced item in the
                    // namespace; scheduler-name filtering happens here.
                    if !event.item.is_eligible(&self.config.scheduler_name) {
                        continue;
                    }

                    match workers {
                        Some(senders) => {
                            let index = partition(&event.item.name, senders.len());
                            if senders[index].send(event.item).is_err() {
                                return Err(StoreError::StreamClosed.into());
                            }
                        }
                        None => {
                            debug!(item = %event.item.name, "evaluating work item");
                            if let Err(err) = self.schedule_item(&event.item).await {
                                warn!(
                                    item = %event.item.name,
                                    error = %err,
                                    "failed to place work item"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    /// Evaluates one work item: snapshot, filter, score, bind.
    pub async fn schedule_item(&self, item: &WorkItem) -> Result<()> {
        let started = Instant::now();

        let nodes = self.store.list_telemetry().await?;
        if nodes.is_empty() {
            return Err(SchedulerError::NoNodesAvailable);
        }
        debug!(nodes = nodes.len(), "fetched telemetry snapshot");

        let filtered = self.strategy.filter(item, nodes)?;
        if filtered.is_empty() {
            return Err(SchedulerError::NoEligibleNodes);
        }
        debug!(eligible = filtered.len(), "nodes filtered");

        let mut scores = self.strategy.score(item, &filtered)?;
        if scores.is_empty() {
            return Err(SchedulerError::NoEligibleNodes);
        }

        // Stable sort: equal scores keep their input order.
        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let top_candidates: Vec<String> = scores
            .iter()
            .take(TOP_CANDIDATES_LOGGED)
            .map(|s| format!("{}={:.2}", s.node_name, s.score))
            .collect();
        let winner = &scores[0];

        self.store
            .bind(&item.namespace, &item.name, &winner.node_name)
            .await?;

        info!(
            item = %item.name,
            namespace = %item.namespace,
            node = %winner.node_name,
            score = winner.score,
            reason = %winner.reason,
            top_candidates = ?top_candidates,
            duration_ms = started.elapsed().as_millis() as u64,
            "work item placed"
        );
        Ok(())
    }
}

fn partition(name: &str, buckets: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() % buckets as u64) as usize
}
