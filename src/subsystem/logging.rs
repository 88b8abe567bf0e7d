//! Logging configurator.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CodecError;
use crate::configurator::{Configurator, Location, Payload, Requirement};
use crate::error::BoxError;
use crate::observability::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `service_bootstrap=debug`. `RUST_LOG` wins.
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Directory for `<name>.log`. Logs go to stdout when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Log file stem; the service name by default.
    pub name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            ansi: true,
            dir: None,
            name: "app".to_string(),
        }
    }
}

impl LogConfig {
    pub fn for_service(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(format!("{}.log", self.name)))
    }
}

/// Installs the global tracing subscriber. Always runs; failures abort startup.
#[derive(Debug, Clone)]
pub struct LogConfigurator {
    settings: LogConfig,
    preloaded: bool,
}

impl LogConfigurator {
    /// Settings looked up in `log.toml`, with `defaults` when none are found.
    pub fn new(defaults: LogConfig) -> Self {
        Self {
            settings: defaults,
            preloaded: false,
        }
    }

    /// Settings already read from the main configuration file.
    pub fn preloaded(settings: LogConfig) -> Self {
        Self {
            settings,
            preloaded: true,
        }
    }

    pub fn settings(&self) -> &LogConfig {
        &self.settings
    }
}

#[async_trait]
impl Configurator for LogConfigurator {
    fn name(&self) -> &str {
        "log"
    }

    fn describe(&self) -> String {
        format!(
            "level={} format={:?} file={}",
            self.settings.level,
            self.settings.format,
            self.settings
                .file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdout".to_string())
        )
    }

    fn location(&self) -> Option<Location> {
        (!self.preloaded).then(|| Location::new("log.toml"))
    }

    fn decode(&mut self, payload: &Payload<'_>) -> Result<(), CodecError> {
        self.settings = payload.decode()?;
        Ok(())
    }

    fn requirement(&self) -> Requirement {
        Requirement::Required
    }

    async fn execute(&mut self) -> Result<(), BoxError> {
        if !logging::init(&self.settings)? {
            tracing::debug!("Tracing subscriber already installed, keeping it");
        }
        Ok(())
    }
}
