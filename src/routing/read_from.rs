/// Read candidate selection policies
use super::{Nodes, ReadFrom};
use crate::core::{NodeRole, RedisNodeDescription};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read from the primary only
#[derive(Debug, Clone, Copy, Default)]
pub struct Primary;

/// Read from the primary, fall back to replicas
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryPreferred;

/// Read from replicas only
#[derive(Debug, Clone, Copy, Default)]
pub struct Replica;

/// Read from replicas, fall back to the primary
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicaPreferred;

/// Read from any data node in topology order.
///
/// Topology sources deliver nodes ordered by measured latency, so the first
/// open candidate is the nearest one.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nearest;

fn with_role(nodes: &Nodes, role: NodeRole) -> impl Iterator<Item = &RedisNodeDescription> {
    nodes.iter().filter(move |node| node.role == role)
}

impl ReadFrom for Primary {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription> {
        with_role(nodes, NodeRole::Primary).cloned().collect()
    }
}

impl ReadFrom for PrimaryPreferred {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription> {
        with_role(nodes, NodeRole::Primary)
            .chain(with_role(nodes, NodeRole::Replica))
            .cloned()
            .collect()
    }
}

impl ReadFrom for Replica {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription> {
        with_role(nodes, NodeRole::Replica).cloned().collect()
    }
}

impl ReadFrom for ReplicaPreferred {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription> {
        with_role(nodes, NodeRole::Replica)
            .chain(with_role(nodes, NodeRole::Primary))
            .cloned()
            .collect()
    }
}

impl ReadFrom for Nearest {
    fn select(&self, nodes: &Nodes) -> Vec<RedisNodeDescription> {
        nodes
            .iter()
            .filter(|node| node.role.is_data_node())
            .cloned()
            .collect()
    }
}

/// Configurable name of a built-in policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFromSetting {
    Primary,
    PrimaryPreferred,
    Replica,
    ReplicaPreferred,
    Nearest,
}

impl ReadFromSetting {
    pub fn policy(&self) -> Arc<dyn ReadFrom> {
        match self {
            ReadFromSetting::Primary => Arc::new(Primary),
            ReadFromSetting::PrimaryPreferred => Arc::new(PrimaryPreferred),
            ReadFromSetting::Replica => Arc::new(Replica),
            ReadFromSetting::ReplicaPreferred => Arc::new(ReplicaPreferred),
            ReadFromSetting::Nearest => Arc::new(Nearest),
        }
    }
}
