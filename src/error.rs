/// Unified error handling for replika
///
/// Local recoverable conditions (cache miss, a single replica down) never
/// surface here; they are handled by iteration and primary fallback. What
/// remains are the conditions a caller has to act on.
use crate::config::ConfigError;
use crate::core::RedisNodeDescription;
use std::io;
use thiserror::Error;

/// Main error type for replika operations
#[derive(Debug, Error)]
pub enum ReplikaError {
    /// The read policy produced no candidate for the current topology
    #[error("Cannot determine a node to read (known nodes: {}) with setting {read_from}", format_nodes(.known_nodes))]
    NoReachableNode {
        known_nodes: Vec<RedisNodeDescription>,
        read_from: String,
    },

    /// Transport failure while opening a replica connection
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectionCreation {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A replica was requested from a provider that has been closed
    #[error("Connection provider is closed")]
    ProviderClosed,

    /// A command was dispatched on a connection that is no longer open
    #[error("Connection to {peer} is closed")]
    ConnectionClosed { peer: String },

    /// Address parsing errors
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for replika operations
pub type ReplikaResult<T> = Result<T, ReplikaError>;

impl ReplikaError {
    pub fn connection_creation<S: Into<String>>(host: S, port: u16, source: io::Error) -> Self {
        ReplikaError::ConnectionCreation {
            host: host.into(),
            port,
            source,
        }
    }

    pub fn connection_closed<S: Into<String>>(peer: S) -> Self {
        ReplikaError::ConnectionClosed { peer: peer.into() }
    }

    pub fn invalid_address<A: Into<String>, R: Into<String>>(address: A, reason: R) -> Self {
        ReplikaError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is recoverable (an external retry may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReplikaError::ConnectionCreation { .. } | ReplikaError::ConnectionClosed { .. }
        )
    }
}

fn format_nodes(nodes: &[RedisNodeDescription]) -> String {
    let rendered: Vec<String> = nodes.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}
