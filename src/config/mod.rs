/// Configuration management for replika
use crate::core::{NodeRole, RedisNodeDescription};
use crate::error::ReplikaResult;
use crate::routing::ReadFromSetting;
use crate::utils::parse_host_port;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main replika configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Primary/replica topology
    pub topology: TopologyConfig,
    /// Connection settings
    pub transport: TransportConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Static topology description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Primary address ("host:port")
    pub primary: String,
    /// Replica addresses ("host:port")
    #[serde(default)]
    pub replicas: Vec<String>,
    /// Read policy; reads go to the primary when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_from: Option<ReadFromSetting>,
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// TCP keepalive interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keepalive_sec: Option<u64>,
    /// Flush every command as soon as it is dispatched
    pub auto_flush: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topology: TopologyConfig {
                primary: "127.0.0.1:6379".to_string(),
                replicas: Vec::new(),
                read_from: None,
            },
            transport: TransportConfig {
                connect_timeout_ms: 5000,
                keepalive_sec: None,
                auto_flush: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_host_port(&self.topology.primary).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid primary address: {}", e))
        })?;

        for replica in &self.topology.replicas {
            parse_host_port(replica).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid replica address: {}", e))
            })?;
            if replica == &self.topology.primary {
                return Err(ConfigError::ValidationError(format!(
                    "Replica {} duplicates the primary address",
                    replica
                )));
            }
        }

        if self.transport.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.transport.keepalive_sec == Some(0) {
            return Err(ConfigError::ValidationError(
                "keepalive_sec must be greater than 0 when set".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Primary first, then replicas in configured order
    pub fn known_nodes(&self) -> ReplikaResult<Vec<RedisNodeDescription>> {
        let mut nodes = Vec::with_capacity(self.topology.replicas.len() + 1);
        nodes.push(RedisNodeDescription::parse(&self.topology.primary, NodeRole::Primary)?);
        for replica in &self.topology.replicas {
            nodes.push(RedisNodeDescription::parse(replica, NodeRole::Replica)?);
        }
        Ok(nodes)
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let config = Config {
            topology: TopologyConfig {
                primary: "10.0.1.20:6379".to_string(),
                replicas: vec!["10.0.1.21:6379".to_string(), "10.0.1.22:6379".to_string()],
                read_from: Some(ReadFromSetting::ReplicaPreferred),
            },
            transport: TransportConfig {
                connect_timeout_ms: 2000,
                keepalive_sec: Some(60),
                auto_flush: true,
            },
            ..Default::default()
        };

        config.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.transport.connect_timeout_ms = 0;
        assert!(config.validate().is_err());

        config.transport.connect_timeout_ms = 1000;
        assert!(config.validate().is_ok());

        config.topology.replicas = vec!["no-port".to_string()];
        assert!(config.validate().is_err());

        config.topology.replicas = vec![config.topology.primary.clone()];
        assert!(config.validate().is_err());

        config.topology.replicas.clear();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str(
            r#"
            [topology]
            primary = "10.0.0.1:6379"
            replicas = ["10.0.0.2:6379"]
            read_from = "replica"

            [transport]
            connect_timeout_ms = 250
            auto_flush = false

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.topology.read_from, Some(ReadFromSetting::Replica));
        assert_eq!(config.transport.keepalive_sec, None);
        assert!(!config.transport.auto_flush);
    }

    #[test]
    fn test_known_nodes() {
        let mut config = Config::default();
        config.topology.replicas = vec!["10.0.0.2:6380".to_string()];

        let nodes = config.known_nodes().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], RedisNodeDescription::primary("127.0.0.1", 6379));
        assert_eq!(nodes[1], RedisNodeDescription::replica("10.0.0.2", 6380));
    }

    #[test]
    fn test_config_file_operations() {
        let temp_file = NamedTempFile::new().unwrap();

        Config::create_example_config(temp_file.path()).unwrap();
        let loaded_config = Config::load_from_file(temp_file.path()).unwrap();
        assert_eq!(loaded_config.topology.replicas.len(), 2);
        assert_eq!(
            loaded_config.topology.read_from,
            Some(ReadFromSetting::ReplicaPreferred)
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_file("/nonexistent/replika.toml");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
