//! Key-value store settings.

use serde::{Deserialize, Serialize};

use crate::configurator::{SourceSettings, DEFAULT_SOURCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    #[default]
    Standalone,
    Cluster,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub source: String,
    pub enable: bool,
    pub mode: StoreMode,
    /// Host, or comma-separated `host:port` nodes in cluster mode.
    pub host: String,
    pub port: u16,
    pub password: String,
    pub database: u32,
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            enable: false,
            mode: StoreMode::default(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            database: 0,
            pool_size: 10,
        }
    }
}

impl StoreConfig {
    /// `host:port` of every node to connect to.
    pub fn addresses(&self) -> Vec<String> {
        match self.mode {
            StoreMode::Standalone => vec![format!("{}:{}", self.host, self.port)],
            StoreMode::Cluster => self
                .host
                .split(',')
                .map(str::trim)
                .filter(|node| !node.is_empty())
                .map(|node| {
                    if node.contains(':') {
                        node.to_string()
                    } else {
                        format!("{}:{}", node, self.port)
                    }
                })
                .collect(),
        }
    }
}

impl SourceSettings for StoreConfig {
    const FAMILY: &'static str = "store";
    const FILE: &'static str = "store.toml";

    fn source(&self) -> &str {
        &self.source
    }

    fn enabled(&self) -> bool {
        self.enable
    }

    fn describe(&self) -> String {
        format!(
            "{}={:?}[{}]/{}",
            self.source,
            self.mode,
            self.addresses().join(","),
            self.database
        )
    }

    fn check(&self) -> Result<(), String> {
        if self.addresses().is_empty() {
            return Err(format!("store source `{}` has no nodes", self.source));
        }
        Ok(())
    }
}
