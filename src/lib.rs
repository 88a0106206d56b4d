/// Replika - primary/replica connection routing for Redis-compatible stores
///
/// Replika decides which connection a command should travel on and frames
/// commands for the wire:
/// 1. Routing: writes go to the primary, reads follow a pluggable `ReadFrom`
///    policy over lazily opened, cached replica connections
/// 2. Framing: commands and pipelined batches are encoded as RESP arrays,
///    with cancelled commands dropped before they reach the wire
pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod routing;
pub mod transport;
pub mod utils;

pub use crate::config::Config;
pub use crate::core::{ConnectionKey, Intent, NodeRole, RedisNodeDescription};
pub use crate::error::{ReplikaError, ReplikaResult};
pub use crate::protocol::{Command, CommandEncoder, Outbound, RedisCommand};
pub use crate::routing::{ConnectionCache, ConnectionProvider, Nodes, ReadFrom, ReadFromSetting};
pub use crate::transport::{ConnectionFactory, StatefulConnection, TcpConnection, TcpConnectionFactory};

use tracing::info;

/// Build a TCP-backed provider from configuration.
///
/// Opens the primary, then applies the configured flush mode, topology and
/// read policy. Replica connections are opened on first use.
pub async fn connect(config: &Config) -> ReplikaResult<ConnectionProvider<TcpConnectionFactory>> {
    config.validate()?;

    let nodes = config.known_nodes()?;
    let factory = TcpConnectionFactory::from_config(&config.transport);
    let primary = nodes
        .iter()
        .find(|node| node.role.is_primary())
        .cloned()
        .ok_or_else(|| ReplikaError::invalid_address(&config.topology.primary, "no primary configured"))?;

    let provider = ConnectionProvider::connect(factory, &primary).await?;
    provider
        .set_auto_flush_commands(config.transport.auto_flush)
        .await;
    provider
        .set_read_from(config.topology.read_from.map(|setting| setting.policy()))
        .await;
    provider.set_known_nodes(nodes).await;

    info!(
        primary = %primary,
        replicas = config.topology.replicas.len(),
        read_from = ?config.topology.read_from,
        "replika provider ready"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_connect_from_config() {
        let (_primary, primary_addr) = listener().await;
        let (_replica, replica_addr) = listener().await;

        let mut config = Config::default();
        config.topology.primary = primary_addr.clone();
        config.topology.replicas = vec![replica_addr.clone()];
        config.topology.read_from = Some(ReadFromSetting::Replica);
        config.transport.auto_flush = false;

        let provider = connect(&config).await.unwrap();
        assert_eq!(provider.primary().peer(), primary_addr);
        assert_eq!(provider.known_nodes().await.len(), 2);
        assert!(!provider.auto_flush_commands().await);

        let read = provider.connection(Intent::Read).await.unwrap();
        assert_eq!(read.peer(), replica_addr);
        assert!(!read.is_auto_flush());

        let write = provider.connection(Intent::Write).await.unwrap();
        assert_eq!(write.peer(), primary_addr);

        provider.close().await;
        assert_eq!(provider.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let mut config = Config::default();
        config.transport.connect_timeout_ms = 0;

        let result = connect(&config).await;
        assert!(matches!(result, Err(ReplikaError::Config(_))));
    }
}
