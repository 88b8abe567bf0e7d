//! Built-in subsystem configurators.
//!
//! # Data Flow
//! ```text
//! load_config phase (remote switch only):
//!     NacosConfigurator    → CenterConnector::connect → Arc<dyn ConfigCenter>
//!
//! init_basic phase:
//!     LogConfigurator      → observability::logging::init
//!     SourcesConfigurator<DatabaseConfig> → Connector<DatabaseConfig> → TableInitializer
//!     SourcesConfigurator<StoreConfig>    → Connector<StoreConfig>
//!     SourcesConfigurator<CacheConfig>    → CacheBinder (store must exist)
//! ```
//!
//! # Design Decisions
//! - Drivers are collaborators behind `Connector<T>`; the engine only owns settings
//! - Every family is exposed as a `SourceSet`, single or multi alike

pub mod cache;
pub mod center;
pub mod database;
pub mod family;
pub mod logging;
pub mod store;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::configurator::SourceSet;
use crate::error::BoxError;
use crate::remote::ConfigCenter;

pub use cache::{CacheBinder, CacheConfig};
pub use center::{NacosConfig, NacosConfigurator, NacosMode};
pub use database::DatabaseConfig;
pub use family::{Shape, SourcesConfigurator};
pub use logging::{LogConfig, LogConfigurator, LogFormat};
pub use store::{StoreConfig, StoreMode};

/// Opens one source of a family (database pool, store client, ...).
#[async_trait]
pub trait Connector<T>: Send + Sync {
    async fn connect(&self, settings: &T) -> Result<(), BoxError>;
}

/// A table registered for initialization on a data source.
pub trait Table: Send + Sync {
    fn table_name(&self) -> &str;

    fn comment(&self) -> Option<&str> {
        None
    }
}

/// Creates or migrates registered tables on one data source.
#[async_trait]
pub trait TableInitializer: Send + Sync {
    async fn init_tables(
        &self,
        source: &DatabaseConfig,
        tables: &[Arc<dyn Table>],
    ) -> Result<(), BoxError>;
}

/// Handles of every subsystem initialized so far.
#[derive(Clone, Default)]
pub struct Subsystems {
    pub database: Option<SourceSet<DatabaseConfig>>,
    pub store: Option<SourceSet<StoreConfig>>,
    pub cache: Option<SourceSet<CacheConfig>>,
    pub center: Option<Arc<dyn ConfigCenter>>,
}

impl Subsystems {
    pub fn database_initialized(&self) -> bool {
        self.database.is_some()
    }

    pub fn store_initialized(&self) -> bool {
        self.store.is_some()
    }

    pub fn cache_initialized(&self) -> bool {
        self.cache.is_some()
    }

    pub fn center_initialized(&self) -> bool {
        self.center.is_some()
    }
}

impl fmt::Debug for Subsystems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystems")
            .field("database", &self.database.as_ref().map(|s| s.names()))
            .field("store", &self.store.as_ref().map(|s| s.names()))
            .field("cache", &self.cache.as_ref().map(|s| s.names()))
            .field("center", &self.center.is_some())
            .finish()
    }
}
