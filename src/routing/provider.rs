/// Connection provider for a primary/replica topology
///
/// Writes always go to the primary. Reads go through the configured
/// `ReadFrom` policy: candidates are resolved in order and the first open
/// connection wins, with the primary as the last resort. Replica connections
/// are opened lazily and cached per host and port until their node leaves
/// the topology or the provider is closed.
use super::{ConnectionCache, Nodes, ReadFrom};
use crate::core::{ConnectionKey, Intent, RedisNodeDescription};
use crate::error::{ReplikaError, ReplikaResult};
use crate::transport::{ConnectionFactory, StatefulConnection};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info};

/// Mutable provider settings, guarded by one lock
#[derive(Debug)]
struct ProviderState {
    known_nodes: Arc<Vec<RedisNodeDescription>>,
    read_from: Option<Arc<dyn ReadFrom>>,
    auto_flush: bool,
    closed: bool,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            known_nodes: Arc::new(Vec::new()),
            read_from: None,
            auto_flush: true,
            closed: false,
        }
    }
}

/// Routes connection requests by intent
pub struct ConnectionProvider<F: ConnectionFactory> {
    factory: F,
    primary: Arc<F::Connection>,
    cache: ConnectionCache<F::Connection>,
    state: Arc<RwLock<ProviderState>>,
}

impl<F: ConnectionFactory> ConnectionProvider<F> {
    /// Create a provider around an already open primary connection
    pub fn new(factory: F, primary: Arc<F::Connection>) -> Self {
        Self {
            factory,
            primary,
            cache: ConnectionCache::new(),
            state: Arc::new(RwLock::new(ProviderState::default())),
        }
    }

    /// Open the primary through `factory` and build a provider around it
    pub async fn connect(factory: F, primary: &RedisNodeDescription) -> ReplikaResult<Self> {
        let connection = factory
            .connect(&primary.host, primary.port)
            .await
            .map_err(|e| ReplikaError::connection_creation(primary.host.clone(), primary.port, e))?;

        info!(primary = %primary, "connected to primary");
        Ok(Self::new(factory, connection))
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn primary(&self) -> Arc<F::Connection> {
        Arc::clone(&self.primary)
    }

    /// Pick a connection for the given intent
    pub async fn connection(&self, intent: Intent) -> ReplikaResult<Arc<F::Connection>> {
        if intent == Intent::Write {
            return Ok(self.primary());
        }

        let (nodes, read_from) = {
            let state = self.state.read().await;
            match &state.read_from {
                Some(read_from) => (Nodes::new(Arc::clone(&state.known_nodes)), Arc::clone(read_from)),
                None => return Ok(self.primary()),
            }
        };

        let candidates = read_from.select(&nodes);
        if candidates.is_empty() {
            return Err(ReplikaError::NoReachableNode {
                known_nodes: nodes.as_slice().to_vec(),
                read_from: format!("{:?}", read_from),
            });
        }

        for node in &candidates {
            let connection = self.connection_for(node).await?;
            if connection.is_open() {
                debug!(intent = %intent, node = %node, "selected connection");
                return Ok(connection);
            }
            debug!(node = %node, "skipping closed candidate");
        }

        debug!(
            candidates = candidates.len(),
            ?read_from,
            "no open read candidate, falling back to primary"
        );
        Ok(self.primary())
    }

    /// Resolve a topology member to its connection, opening it on first use
    pub async fn connection_for(&self, node: &RedisNodeDescription) -> ReplikaResult<Arc<F::Connection>> {
        if node.role.is_primary() {
            return Ok(self.primary());
        }

        let key = ConnectionKey::from(node);
        self.cache
            .get_or_create(&key, || self.open_replica(key.clone()))
            .await
    }

    /// Open a replica connection and apply the current flush mode.
    ///
    /// The returned read guard keeps settings from changing until the cache
    /// has published the connection.
    async fn open_replica(
        &self,
        key: ConnectionKey,
    ) -> ReplikaResult<(Arc<F::Connection>, OwnedRwLockReadGuard<ProviderState>)> {
        if self.state.read().await.closed {
            return Err(ReplikaError::ProviderClosed);
        }

        let connection = self
            .factory
            .connect(key.host(), key.port())
            .await
            .map_err(|e| ReplikaError::connection_creation(key.host(), key.port(), e))?;

        let state = Arc::clone(&self.state).read_owned().await;
        if state.closed {
            connection.close();
            return Err(ReplikaError::ProviderClosed);
        }
        connection.set_auto_flush_commands(state.auto_flush);

        debug!(key = %key, auto_flush = state.auto_flush, "opened replica connection");
        Ok((connection, state))
    }

    /// Cached replica connections plus the primary
    pub fn connection_count(&self) -> usize {
        self.cache.size() + 1
    }

    /// Cached keys whose node is no longer part of the known topology
    pub async fn stale_connection_keys(&self) -> Vec<ConnectionKey> {
        let state = self.state.read().await;
        self.cache.stale_keys(&state.known_nodes)
    }

    /// Drop and close connections to nodes that left the topology. Returns
    /// the number of connections closed.
    pub async fn close_stale_connections(&self) -> usize {
        debug!(connections = self.connection_count(), "closing stale connections");

        let stale = self.stale_connection_keys().await;
        let mut closed = 0;
        for key in &stale {
            // Detach first so no caller picks up a connection we are closing
            if let Some(connection) = self.cache.invalidate(key) {
                connection.close();
                closed += 1;
            }
        }

        debug!(
            closed,
            connections = self.connection_count(),
            "closed stale connections"
        );
        closed
    }

    /// Replace the known topology and prune connections to removed nodes
    pub async fn set_known_nodes<I>(&self, nodes: I)
    where
        I: IntoIterator<Item = RedisNodeDescription>,
    {
        let nodes: Vec<RedisNodeDescription> = nodes.into_iter().collect();
        {
            let mut state = self.state.write().await;
            info!(
                previous = state.known_nodes.len(),
                current = nodes.len(),
                "known nodes updated"
            );
            state.known_nodes = Arc::new(nodes);
        }

        self.close_stale_connections().await;
    }

    pub async fn known_nodes(&self) -> Nodes {
        Nodes::new(Arc::clone(&self.state.read().await.known_nodes))
    }

    /// Set or clear the read policy; applies from the next read request
    pub async fn set_read_from(&self, read_from: Option<Arc<dyn ReadFrom>>) {
        let mut state = self.state.write().await;
        debug!(?read_from, "read policy updated");
        state.read_from = read_from;
    }

    pub async fn read_from(&self) -> Option<Arc<dyn ReadFrom>> {
        self.state.read().await.read_from.clone()
    }

    /// Set the flush mode on every live connection and on connections opened
    /// from now on
    pub async fn set_auto_flush_commands(&self, auto_flush: bool) {
        let mut state = self.state.write().await;
        state.auto_flush = auto_flush;

        self.primary.set_auto_flush_commands(auto_flush);
        for connection in self.cache.connections() {
            connection.set_auto_flush_commands(auto_flush);
        }
    }

    pub async fn auto_flush_commands(&self) -> bool {
        self.state.read().await.auto_flush
    }

    /// Discard unflushed commands on every connection
    pub fn reset(&self) {
        self.primary.reset();
        for connection in self.cache.connections() {
            connection.reset();
        }
    }

    /// Flush queued commands on every connection
    pub fn flush_commands(&self) {
        self.primary.flush_commands();
        for connection in self.cache.connections() {
            connection.flush_commands();
        }
    }

    /// Close every connection and empty the cache.
    ///
    /// Repeated calls are accepted. After close, write requests still return
    /// the (closed) primary while replica resolution fails with
    /// `ProviderClosed`.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if !state.closed {
                info!(connections = self.connection_count(), "closing connection provider");
            }
            state.closed = true;
        }

        self.primary.close();
        for connection in self.cache.connections() {
            connection.close();
        }
        self.cache.invalidate_all();
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }
}
