/// Replica connection cache with a single loader per key
use crate::core::{ConnectionKey, RedisNodeDescription};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;

/// Connections keyed by host and port.
///
/// Lookups on published entries never block. A miss serializes on the key's
/// creation lock, so concurrent misses for one key run the loader once while
/// misses for different keys proceed in parallel.
pub struct ConnectionCache<C> {
    live: DashMap<ConnectionKey, Arc<C>>,
    loading: DashMap<ConnectionKey, Arc<Mutex<()>>>,
}

impl<C: Send + Sync + 'static> ConnectionCache<C> {
    pub fn new() -> Self {
        Self {
            live: DashMap::new(),
            loading: DashMap::new(),
        }
    }

    /// Return the cached connection for `key`, creating it with `load` on a
    /// miss.
    ///
    /// The loader yields the connection and a guard. The guard is dropped only
    /// after the connection is visible in the cache, which lets the caller
    /// keep a lock held across publication. A failed load publishes nothing;
    /// the next call for the key runs the loader again.
    pub async fn get_or_create<L, Fut, G, E>(&self, key: &ConnectionKey, load: L) -> Result<Arc<C>, E>
    where
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Arc<C>, G), E>>,
    {
        if let Some(connection) = self.get_if_present(key) {
            return Ok(connection);
        }

        let creation = self.creation_lock(key);
        let _creating = creation.lock().await;

        // Another caller may have published while we waited
        if let Some(connection) = self.get_if_present(key) {
            trace!(key = %key, "connection published while waiting");
            return Ok(connection);
        }

        let (connection, guard) = load().await?;
        self.live.insert(key.clone(), Arc::clone(&connection));
        drop(guard);

        Ok(connection)
    }

    pub fn get_if_present(&self, key: &ConnectionKey) -> Option<Arc<C>> {
        self.live.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove the entry for `key` and hand back the detached connection.
    /// The connection is not closed.
    pub fn invalidate(&self, key: &ConnectionKey) -> Option<Arc<C>> {
        let removed = self.live.remove(key).map(|(_, connection)| connection);
        // Only the map holds an idle lock; a waiting or running loader keeps it
        self.loading.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        removed
    }

    pub fn invalidate_all(&self) {
        self.live.clear();
        self.loading.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Point-in-time copy of all published entries
    pub fn snapshot(&self) -> HashMap<ConnectionKey, Arc<C>> {
        self.live
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn keys(&self) -> Vec<ConnectionKey> {
        self.live.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn connections(&self) -> Vec<Arc<C>> {
        self.live.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    /// Keys with no matching member in `nodes`
    pub fn stale_keys(&self, nodes: &[RedisNodeDescription]) -> Vec<ConnectionKey> {
        self.keys()
            .into_iter()
            .filter(|key| !nodes.iter().any(|node| key.matches(node)))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn creation_lock(&self, key: &ConnectionKey) -> Arc<Mutex<()>> {
        let entry = self
            .loading
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }
}

impl<C: Send + Sync + 'static> Default for ConnectionCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ConnectionCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("size", &self.live.len())
            .finish()
    }
}
