use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::store::TagCache;

/// Spawn a task that evicts expired entries every `interval`.
///
/// Lazy eviction on read keeps `get` correct on its own; the sweep only bounds
/// memory held by keys that are never read again. Abort the handle to stop it.
pub fn spawn_expiry_sweeper<V>(cache: Arc<TagCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // Skip the first immediate tick
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = cache.len(), "Swept expired cache entries");
            }
        }
    })
}

/// Start the sweeper at the cache's configured cadence, if sweeping is enabled.
pub fn spawn_configured_sweeper<V>(cache: Arc<TagCache<V>>) -> Option<JoinHandle<()>>
where
    V: Clone + Send + Sync + 'static,
{
    let interval = cache.config().sweep_interval()?;
    Some(spawn_expiry_sweeper(cache, interval))
}
