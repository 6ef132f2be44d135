//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ExpiringCache;

/// Spawns a background task that periodically sweeps expired entries.
///
/// Reads already ignore and remove expired entries, so the sweep only
/// reclaims space for keys nobody reads again. A failed sweep is logged and
/// retried on the next tick.
///
/// # Arguments
/// * `cache` - Shared cache whose store is swept
/// * `sweep_interval_secs` - Interval in seconds between sweeps
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(ExpiringCache::new(Arc::new(MemoryStore::new())));
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<ExpiringCache>, sweep_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(sweep_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {} seconds",
            sweep_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.sweep_expired().await {
                Ok(0) => debug!("Expiry sweep: no expired entries found"),
                Ok(_) => {}
                Err(err) => warn!("Expiry sweep failed: {}", err),
            }
        }
    })
}
