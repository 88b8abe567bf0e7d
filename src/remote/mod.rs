//! Config center and naming service collaborators.
//!
//! # Responsibilities
//! - Define the `ConfigCenter` seam the engine talks to
//! - Provide the default Nacos open-API client (reqwest)
//! - Keep the latest content of every listened settings document
//!
//! # Data Flow
//! ```text
//! CenterConnector::connect(&NacosConfig) → Arc<dyn ConfigCenter>
//!     ├── fetch(group, data_id)         → settings text for the resolver
//!     ├── listen(group, data_id, tx)    → ConfigChange stream
//!     │       → ContentCache::apply (changed flag)
//!     └── register / deregister(Instance)
//! ```

pub mod monitor;
pub mod nacos;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::subsystem::NacosConfig;

pub use monitor::{CachedContent, ContentCache};
pub use nacos::{NacosClient, NacosConnector};

/// Group under which locally watched files are cached.
pub const LOCAL_GROUP: &str = "local";

/// A new version of one settings document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    pub group: String,
    pub data_id: String,
    pub content: String,
}

/// Identity of this process in the naming service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("config `{data_id}` not found in group `{group}`")]
    NotFound { group: String, data_id: String },
    #[error("config center request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("config center responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid config center address `{0}`")]
    InvalidAddress(String),
    #[error("{0} client is disabled by the configured mode")]
    Disabled(&'static str),
    #[error("no config center server reachable")]
    NoServer,
}

/// Remote settings source and naming registry.
#[async_trait]
pub trait ConfigCenter: Send + Sync {
    /// Fetch the current content of a settings document.
    async fn fetch(&self, group: &str, data_id: &str) -> Result<String, RemoteError>;

    /// Push every later content change of a document into `updates`.
    async fn listen(
        &self,
        group: &str,
        data_id: &str,
        updates: mpsc::UnboundedSender<ConfigChange>,
    ) -> Result<(), RemoteError>;

    async fn register(&self, instance: &Instance) -> Result<(), RemoteError>;

    async fn deregister(&self, instance: &Instance) -> Result<(), RemoteError>;
}

/// Builds a config center client from its settings.
#[async_trait]
pub trait CenterConnector: Send + Sync {
    async fn connect(&self, settings: &NacosConfig) -> Result<Arc<dyn ConfigCenter>, RemoteError>;
}
