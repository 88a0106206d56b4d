/// Topology member descriptions as delivered by topology discovery
use crate::error::ReplikaResult;
use crate::utils::parse_host_port;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a node currently plays in the replicated topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Primary,
    Replica,
    Sentinel,
}

impl NodeRole {
    pub fn is_primary(&self) -> bool {
        matches!(self, NodeRole::Primary)
    }

    pub fn is_replica(&self) -> bool {
        matches!(self, NodeRole::Replica)
    }

    /// Primaries and replicas hold data; sentinels only monitor
    pub fn is_data_node(&self) -> bool {
        matches!(self, NodeRole::Primary | NodeRole::Replica)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Primary => write!(f, "primary"),
            NodeRole::Replica => write!(f, "replica"),
            NodeRole::Sentinel => write!(f, "sentinel"),
        }
    }
}

/// A known node: address plus role
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RedisNodeDescription {
    pub host: String,
    pub port: u16,
    pub role: NodeRole,
}

impl RedisNodeDescription {
    pub fn new(host: impl Into<String>, port: u16, role: NodeRole) -> Self {
        Self {
            host: host.into(),
            port,
            role,
        }
    }

    pub fn primary(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, NodeRole::Primary)
    }

    pub fn replica(host: impl Into<String>, port: u16) -> Self {
        Self::new(host, port, NodeRole::Replica)
    }

    /// Build a descriptor from a "host:port" address
    pub fn parse(addr: &str, role: NodeRole) -> ReplikaResult<Self> {
        let (host, port) = parse_host_port(addr)?;
        Ok(Self::new(host, port, role))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RedisNodeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.host, self.port, self.role)
    }
}
