/// Intent-based connection routing for primary/replica topologies
///
/// - `ConnectionCache`: replica connections keyed by host and port, created
///   lazily with one loader per key
/// - `ReadFrom`: pluggable read candidate selection
/// - `ConnectionProvider`: maps an intent to a live connection and prunes
///   connections to nodes that left the topology
pub mod cache;
pub mod provider;
pub mod read_from;

use crate::core::RedisNodeDescription;
use std::fmt;
use std::sync::Arc;

pub use cache::ConnectionCache;
pub use provider::ConnectionProvider;
pub use read_from::ReadFromSetting;

/// Read candidate selection policy.
///
/// Given the known topology, return the nodes to try for a read, in order of
/// preference. An empty result means no node is acceptable.
pub trait ReadFrom: Send + Sync + fmt::Debug {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription>;
}

/// Immutable snapshot of the known topology handed to a `ReadFrom` policy.
///
/// Topology updates replace the provider's list wholesale, so a snapshot
/// never changes underneath a running selection.
#[derive(Debug, Clone, Default)]
pub struct Nodes {
    nodes: Arc<Vec<RedisNodeDescription>>,
}

impl Nodes {
    pub fn new(nodes: Arc<Vec<RedisNodeDescription>>) -> Self {
        Self { nodes }
    }

    pub fn as_slice(&self) -> &[RedisNodeDescription] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RedisNodeDescription> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl From<Vec<RedisNodeDescription>> for Nodes {
    fn from(nodes: Vec<RedisNodeDescription>) -> Self {
        Self::new(Arc::new(nodes))
    }
}

impl<'a> IntoIterator for &'a Nodes {
    type Item = &'a RedisNodeDescription;
    type IntoIter = std::slice::Iter<'a, RedisNodeDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
