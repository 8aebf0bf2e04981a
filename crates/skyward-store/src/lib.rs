//! Skyward store - gateway to the cluster's shared record store.
//!
//! The gateway exposes typed operations over named records in a namespace:
//! telemetry upsert/get/list/delete with a status subresource, work-item
//! access with an at-most-once bind, pod and service-endpoint listings, and
//! change-notification streams for unplaced work items and topology.
//!
//! Two backends implement the [`ClusterStore`] trait: an in-memory store
//! for tests and single-process setups, and a Valkey-backed store for real
//! clusters. The gateway knows nothing about placement or routing.

pub mod config;
pub mod error;
pub mod memory;
pub mod record;
pub mod traits;
pub mod valkey;

use std::sync::Arc;

use tracing::info;

pub use config::{RetryPolicy, StoreConfig};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use record::{RecordStatus, StoredRecord};
pub use traits::{ClusterStore, EventKind, TopologyEvent, WorkItemEvent};
pub use valkey::ValkeyStore;

/// Selects and connects a store backend from the configuration.
///
/// An empty URL yields the in-process memory backend; anything else is
/// treated as a Valkey connection string. Connection failure is surfaced
/// to the caller, which treats it as fatal.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn ClusterStore>> {
    if config.url.is_empty() {
        info!("no store URL configured, using in-memory store");
        Ok(Arc::new(MemoryStore::new(config.retry)))
    } else {
        let store = ValkeyStore::connect(config).await?;
        info!(url = %config.url, "connected to cluster store");
        Ok(Arc::new(store))
    }
}
