//! Shared helpers for scheduler integration tests.

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use skyward_store::ClusterStore;

/// Polls the store until the item is bound or the timeout elapses,
/// returning the assigned node.
pub async fn wait_for_binding(
    store: &Arc<dyn ClusterStore>,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Option<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(item) = store.get_work_item(namespace, name).await {
            if item.is_assigned() {
                return item.assigned_node;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
