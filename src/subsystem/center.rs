//! Config center (Nacos) settings and configurator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::CodecError;
use crate::configurator::{Configurator, Location, Payload, Requirement};
use crate::error::BoxError;
use crate::remote::{CenterConnector, ConfigCenter, RemoteError};

/// Which Nacos clients are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NacosMode {
    Config,
    Naming,
    #[default]
    ConfigAndNaming,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NacosConfig {
    /// Comma-separated `host:port` list, optionally with a scheme.
    pub address: String,
    pub username: String,
    pub password: String,
    pub namespace: String,
    pub mode: NacosMode,
    pub poll_interval_secs: u64,
    pub heartbeat_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for NacosConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8848".to_string(),
            username: String::new(),
            password: String::new(),
            namespace: "public".to_string(),
            mode: NacosMode::default(),
            poll_interval_secs: 10,
            heartbeat_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

impl NacosConfig {
    pub fn enable_config(&self) -> bool {
        matches!(self.mode, NacosMode::Config | NacosMode::ConfigAndNaming)
    }

    pub fn enable_naming(&self) -> bool {
        matches!(self.mode, NacosMode::Naming | NacosMode::ConfigAndNaming)
    }

    /// Namespace id sent on the wire; `public` is the empty tenant.
    pub fn tenant(&self) -> &str {
        if self.namespace == "public" {
            ""
        } else {
            &self.namespace
        }
    }

    /// Base URLs (`.../nacos/`) of every configured server.
    pub fn server_urls(&self) -> Result<Vec<Url>, RemoteError> {
        let urls = self
            .address
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                let base = if addr.contains("://") {
                    addr.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", addr.trim_end_matches('/'))
                };
                Url::parse(&format!("{base}/nacos/"))
                    .map_err(|_| RemoteError::InvalidAddress(addr.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if urls.is_empty() {
            return Err(RemoteError::InvalidAddress(self.address.clone()));
        }
        Ok(urls)
    }

    pub fn describe(&self) -> String {
        let password = if self.password.is_empty() { "" } else { "******" };
        format!(
            "address={} namespace={} mode={:?} username={} password={}",
            self.address, self.namespace, self.mode, self.username, password
        )
    }
}

/// Connects the config center client. Settings come from the main file only.
pub struct NacosConfigurator {
    settings: NacosConfig,
    connector: Arc<dyn CenterConnector>,
    center: Option<Arc<dyn ConfigCenter>>,
}

impl NacosConfigurator {
    pub fn new(settings: NacosConfig, connector: Arc<dyn CenterConnector>) -> Self {
        Self {
            settings,
            connector,
            center: None,
        }
    }

    pub fn center(&self) -> Option<Arc<dyn ConfigCenter>> {
        self.center.clone()
    }
}

#[async_trait]
impl Configurator for NacosConfigurator {
    fn name(&self) -> &str {
        "nacos"
    }

    fn describe(&self) -> String {
        self.settings.describe()
    }

    fn location(&self) -> Option<Location> {
        None
    }

    fn decode(&mut self, payload: &Payload<'_>) -> Result<(), CodecError> {
        self.settings = payload.decode()?;
        Ok(())
    }

    fn requirement(&self) -> Requirement {
        Requirement::Required
    }

    async fn execute(&mut self) -> Result<(), BoxError> {
        let center = self.connector.connect(&self.settings).await?;
        self.center = Some(center);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_urls() {
        let config = NacosConfig {
            address: "10.0.0.1:8848, https://nacos.internal/".into(),
            ..NacosConfig::default()
        };
        let urls = config.server_urls().unwrap();
        assert_eq!(urls[0].as_str(), "http://10.0.0.1:8848/nacos/");
        assert_eq!(urls[1].as_str(), "https://nacos.internal/nacos/");

        let empty = NacosConfig {
            address: " , ".into(),
            ..NacosConfig::default()
        };
        assert!(matches!(empty.server_urls(), Err(RemoteError::InvalidAddress(_))));
    }

    #[test]
    fn test_mode_switches_clients() {
        let mut config = NacosConfig::default();
        assert!(config.enable_config() && config.enable_naming());

        config.mode = NacosMode::Naming;
        assert!(!config.enable_config());
        assert!(config.enable_naming());

        let parsed: NacosConfig = toml::from_str("mode = \"config\"").unwrap();
        assert_eq!(parsed.mode, NacosMode::Config);
    }

    #[test]
    fn test_describe_masks_password() {
        let config = NacosConfig {
            password: "secret".into(),
            ..NacosConfig::default()
        };
        assert!(!config.describe().contains("secret"));
        assert_eq!(config.tenant(), "");
    }
}
