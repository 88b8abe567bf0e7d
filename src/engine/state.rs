//! Engine state shared by every phase.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::watch;

use super::{EngineHandle, Phase, Switch};
use crate::config::{AppConfig, Format};
use crate::configurator::Configurator;
use crate::error::{BootstrapError, BoxError};
use crate::http::{Launcher, MiddlewareFn, RouteFn};
use crate::lifecycle::Shutdown;
use crate::remote::{CenterConnector, ConfigCenter, ContentCache};
use crate::subsystem::{Connector, DatabaseConfig, StoreConfig, Subsystems, Table, TableInitializer};
use crate::task::TaskResult;

/// A caller-registered zero-argument initialization function.
pub type CustomFunc = Box<dyn FnMut() -> BoxFuture<'static, TaskResult> + Send + Sync>;

/// Decodes fetched content and hands it to the caller.
pub(crate) type ApplyFn = Box<dyn FnMut(Format, &str) -> Result<(), BoxError> + Send + Sync>;

/// Settings document requested through `load_remote_settings`.
pub(crate) struct RemoteEntry {
    pub(crate) data_id: String,
    pub(crate) listen: bool,
    pub(crate) apply: ApplyFn,
}

/// External components the phases call into.
#[derive(Clone)]
pub struct Collaborators {
    pub center: Arc<dyn CenterConnector>,
    pub launcher: Arc<dyn Launcher>,
    pub database: Option<Arc<dyn Connector<DatabaseConfig>>>,
    pub store: Option<Arc<dyn Connector<StoreConfig>>>,
    pub tables: Option<Arc<dyn TableInitializer>>,
}

/// Everything the phases read and mutate.
pub struct EngineState {
    pub(crate) phase: Phase,
    pub(crate) switches: HashSet<Switch>,
    pub(crate) config_dir: PathBuf,
    pub(crate) config: AppConfig,
    pub(crate) custom_funcs: Vec<CustomFunc>,
    pub(crate) configurators: Vec<Box<dyn Configurator>>,
    pub(crate) tables: BTreeMap<String, Vec<Arc<dyn Table>>>,
    pub(crate) routes: Vec<RouteFn>,
    pub(crate) middleware: Vec<MiddlewareFn>,
    pub(crate) remote_settings: Vec<RemoteEntry>,
    pub(crate) collaborators: Collaborators,
    pub(crate) subsystems: Subsystems,
    pub(crate) cache: ContentCache,
    pub(crate) shutdown: Shutdown,
    pub(crate) published: watch::Sender<Subsystems>,
}

impl EngineState {
    pub(crate) fn new(
        config_dir: PathBuf,
        switches: HashSet<Switch>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            phase: Phase::Unconfigured,
            switches,
            config_dir,
            config: AppConfig::default(),
            custom_funcs: Vec::new(),
            configurators: Vec::new(),
            tables: BTreeMap::new(),
            routes: Vec::new(),
            middleware: Vec::new(),
            remote_settings: Vec::new(),
            collaborators,
            subsystems: Subsystems::default(),
            cache: ContentCache::new(),
            shutdown: Shutdown::new(),
            published: watch::channel(Subsystems::default()).0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub(crate) fn ensure_not_running(&self) -> Result<(), BootstrapError> {
        if self.is_running() {
            return Err(BootstrapError::AlreadyRunning);
        }
        Ok(())
    }

    pub fn is_enabled(&self, switch: Switch) -> bool {
        self.switches.contains(&switch)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of a settings file inside the config directory.
    pub fn config_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.config_dir.join(file)
    }

    pub fn subsystems(&self) -> &Subsystems {
        &self.subsystems
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shutdown: self.shutdown.clone(),
            cache: self.cache.clone(),
            subsystems: self.published.subscribe(),
        }
    }

    /// Make the current subsystems visible to every handle.
    pub(crate) fn publish(&self) {
        self.published.send_replace(self.subsystems.clone());
    }

    /// The connected config center, if remote settings are enabled.
    pub(crate) fn remote_center(&self) -> Option<Arc<dyn ConfigCenter>> {
        if self.is_enabled(Switch::RemoteConfig) {
            self.subsystems.center.clone()
        } else {
            None
        }
    }
}

impl fmt::Debug for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineState")
            .field("phase", &self.phase)
            .field("switches", &self.switches)
            .field("config_dir", &self.config_dir)
            .field("custom_funcs", &self.custom_funcs.len())
            .field("configurators", &self.configurators.len())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("routes", &self.routes.len())
            .field("subsystems", &self.subsystems)
            .finish()
    }
}
