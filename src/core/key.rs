/// Identity of a pooled replica connection
use crate::core::RedisNodeDescription;
use std::fmt;

/// Host and port of a cached connection.
///
/// Two keys are equal iff both host and port match. Keys are immutable once
/// built; the cache uses them as its only lookup identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    host: String,
    port: u16,
}

impl ConnectionKey {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this key points at the given topology member
    pub fn matches(&self, node: &RedisNodeDescription) -> bool {
        self.port == node.port && self.host == node.host
    }
}

impl From<&RedisNodeDescription> for ConnectionKey {
    fn from(node: &RedisNodeDescription) -> Self {
        Self::new(node.host.clone(), node.port)
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_equality() {
        assert_eq!(ConnectionKey::new("10.0.0.1", 6379), ConnectionKey::new("10.0.0.1", 6379));
        assert_ne!(ConnectionKey::new("10.0.0.1", 6379), ConnectionKey::new("10.0.0.1", 6380));
        assert_ne!(ConnectionKey::new("10.0.0.1", 6379), ConnectionKey::new("10.0.0.2", 6379));
    }

    #[test]
    fn test_key_hash_dedup() {
        let mut keys = HashSet::new();
        keys.insert(ConnectionKey::new("replica-a", 6379));
        keys.insert(ConnectionKey::new("replica-a", 6379));
        keys.insert(ConnectionKey::new("replica-b", 6379));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_key_matches_node() {
        let node = RedisNodeDescription::replica("10.0.0.5", 6380);
        let key = ConnectionKey::from(&node);

        assert!(key.matches(&node));
        assert!(!key.matches(&RedisNodeDescription::replica("10.0.0.5", 6379)));
        assert_eq!(key.to_string(), "10.0.0.5:6380");
    }
}
