//! Configuration schema definitions.
//!
//! This module defines the main configuration file layout (`config.toml`).
//! Subsystem sections reuse the settings types of their configurators so a
//! family can be configured either here or in its own file.

use serde::{Deserialize, Serialize};

use crate::configurator::Sources;
use crate::remote::Instance;
use crate::subsystem::{CacheConfig, DatabaseConfig, LogConfig, NacosConfig, StoreConfig};

/// Name of the main configuration file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Default config directory, relative to the working directory.
pub const DEFAULT_CONFIG_DIR: &str = "conf";

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server identity and listener settings.
    pub server: ServerConfig,

    /// Logging settings; `log.toml` is consulted when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,

    /// Config center / naming service settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nacos: Option<NacosConfig>,

    /// Relational data sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<Sources<DatabaseConfig>>,

    /// Key-value store sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<Sources<StoreConfig>>,

    /// Cache layers on top of the key-value store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<Sources<CacheConfig>>,
}

/// Server identity and listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Service name; also the config center group.
    pub name: String,

    /// Advertised host. Empty means "derive from the outbound interface".
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// API prefix every registered route is mounted under.
    pub prefix: String,

    /// Verbose configurator logging.
    pub debug: bool,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Prometheus exporter bind address (e.g. "0.0.0.0:9090").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            host: String::new(),
            port: 8888,
            prefix: "app".to_string(),
            debug: false,
            request_timeout_secs: 30,
            metrics_address: None,
        }
    }
}

impl ServerConfig {
    /// Route prefix with exactly one leading slash, or empty for the root.
    pub fn api_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Public URL of the API root.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.api_prefix())
    }

    /// Identity registered with the naming service.
    pub fn instance(&self) -> Instance {
        Instance {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_prefix_normalization() {
        let mut server = ServerConfig::default();
        assert_eq!(server.api_prefix(), "/app");

        server.prefix = "/v1/".into();
        assert_eq!(server.api_prefix(), "/v1");

        server.prefix = "/".into();
        assert_eq!(server.api_prefix(), "");
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let config: AppConfig = toml::from_str("[server]\nname = \"orders\"").unwrap();
        assert_eq!(config.server.name, "orders");
        assert_eq!(config.server.port, 8888);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_family_sections_are_source_lists() {
        let config: AppConfig = toml::from_str(
            r#"
            [[database]]
            source = "default"
            enable = true
            type = "postgres"

            [[database]]
            source = "report"
            enable = true
            type = "mysql"
            "#,
        )
        .unwrap();
        let database = config.database.unwrap();
        assert_eq!(database.len(), 2);
        assert_eq!(database.as_slice()[1].source, "report");
    }
}
