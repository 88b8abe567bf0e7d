//! The five bootstrap phases.
//!
//! # Responsibilities
//! - Guard every phase: never after `Running`, never twice, never out of order
//! - Phase 1: main config file, advertised host, config center, registration
//! - Phase 2: log → database → tables → store → cache (cache needs a store)
//! - Phase 3: caller configurators in registration order
//! - Phase 4: deferred remote settings, then caller functions
//! - Phase 5: metrics exporter and the HTTP server
//!
//! # Design Decisions
//! - Storage families are best-effort: a missing or failing family is logged and skipped
//! - A store always brings up a cache, with default settings when none are found
//! - Caller work that fails stays queued in the state so a retried phase resumes it
//! - A panicking server parks the engine until shutdown instead of returning early

use std::env;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;

use super::{EngineState, Phase, Switch};
use crate::config::loader;
use crate::config::{AppConfig, Format, CONFIG_FILE};
use crate::configurator::{Configurator, Resolution, Resolver};
use crate::error::{BootstrapError, BoxError};
use crate::http::ServePlan;
use crate::lifecycle::signals;
use crate::net;
use crate::observability::metrics;
use crate::subsystem::{
    CacheBinder, CacheConfig, Connector, DatabaseConfig, LogConfig, LogConfigurator,
    NacosConfigurator, SourcesConfigurator, StoreConfig,
};

impl EngineState {
    /// Run one phase with its guards. Completed phases are skipped.
    pub async fn run_phase(&mut self, phase: Phase) -> Result<(), BootstrapError> {
        self.ensure_not_running()?;
        if self.phase >= phase {
            tracing::debug!(phase = %phase, "Phase already completed, skipped");
            return Ok(());
        }
        let Some(expected) = phase.predecessor() else {
            return Ok(());
        };
        if self.phase != expected {
            return Err(BootstrapError::PhaseOrder {
                phase,
                expected,
                current: self.phase,
            });
        }

        let started = Instant::now();
        tracing::info!(phase = %phase, "Entering phase");
        let result = match phase {
            Phase::Unconfigured => Ok(()),
            Phase::ConfigLoaded => self.load_config().await,
            Phase::BasicInitialized => self.init_basic().await,
            Phase::ConfiguratorsRun => self.run_configurators().await,
            Phase::CustomFuncsRun => self.run_custom_funcs().await,
            Phase::Running => self.start_server().await,
        };
        metrics::record_phase(phase, started, result.is_ok());
        self.publish();

        match &result {
            Ok(()) => {
                if phase != Phase::Running {
                    self.phase = phase;
                }
                tracing::info!(phase = %phase, elapsed_ms = started.elapsed().as_millis() as u64, "Phase completed");
            }
            Err(err) => tracing::error!(phase = %phase, error = %err, "Phase failed"),
        }
        result
    }

    async fn resolve(&self, configurator: &mut dyn Configurator) -> Result<Resolution, BootstrapError> {
        let center = self.remote_center();
        let mut resolver = Resolver::new(&self.config_dir, &self.cache)
            .debug(self.is_enabled(Switch::Debug) || self.config.server.debug);
        if let Some(center) = center.as_deref() {
            resolver = resolver.with_remote(center, &self.config.server.name);
        }
        resolver.resolve(configurator).await
    }

    async fn load_config(&mut self) -> Result<(), BootstrapError> {
        let path = self.config_path(CONFIG_FILE);
        let (mut config, created) = loader::load_or_init(&path, &AppConfig::default())
            .map_err(|source| BootstrapError::Config {
                path: path.clone(),
                source,
            })?;

        if self.is_enabled(Switch::EnvPort) {
            if let Ok(raw) = env::var("PORT") {
                match raw.trim().parse::<u16>() {
                    Ok(port) if port != 0 => config.server.port = port,
                    _ => tracing::warn!(value = %raw, "Ignoring invalid PORT"),
                }
            }
        }
        config.server.host = net::resolve_host(&config.server.host);

        tracing::info!(
            path = %path.display(),
            created,
            name = %config.server.name,
            host = %config.server.host,
            port = config.server.port,
            "Configuration loaded"
        );
        self.config = config;

        if self.is_enabled(Switch::RemoteConfig) {
            self.connect_center().await?;
        }
        Ok(())
    }

    async fn connect_center(&mut self) -> Result<(), BootstrapError> {
        let settings = self.config.nacos.clone().unwrap_or_default();
        let naming = settings.enable_naming();
        let mut configurator =
            NacosConfigurator::new(settings, self.collaborators.center.clone());
        self.resolve(&mut configurator).await?;
        let center = configurator
            .center()
            .ok_or(BootstrapError::CenterUnavailable)?;

        if naming {
            let instance = self.config.server.instance();
            center
                .register(&instance)
                .await
                .map_err(|source| BootstrapError::Register {
                    instance: instance.to_string(),
                    source,
                })?;
        }
        self.subsystems.center = Some(center);
        Ok(())
    }

    async fn init_basic(&mut self) -> Result<(), BootstrapError> {
        let mut log = match self.config.log.clone() {
            Some(settings) => LogConfigurator::preloaded(settings),
            None => LogConfigurator::new(LogConfig::for_service(&self.config.server.name)),
        };
        self.resolve(&mut log).await?;

        let mut database = SourcesConfigurator::<DatabaseConfig>::for_family(
            self.config.database.clone(),
            self.is_enabled(Switch::MultiDatabase),
        )
        .with_connector(self.collaborators.database.clone());
        if let Resolution::Executed(_) = self.resolve(&mut database).await? {
            self.subsystems.database = database.into_installed();
        }
        if self.subsystems.database_initialized() {
            self.init_tables().await?;
        } else if !self.tables.is_empty() {
            tracing::warn!(sources = ?self.tables.keys().collect::<Vec<_>>(), "Tables registered but no database initialized");
        }

        let mut store = SourcesConfigurator::<StoreConfig>::for_family(
            self.config.store.clone(),
            self.is_enabled(Switch::MultiStore),
        )
        .with_connector(self.collaborators.store.clone());
        if let Resolution::Executed(_) = self.resolve(&mut store).await? {
            self.subsystems.store = store.into_installed();
        }

        let Some(stores) = self.subsystems.store.clone() else {
            tracing::info!("Store not initialized, cache skipped");
            return Ok(());
        };
        let binder: std::sync::Arc<dyn Connector<CacheConfig>> =
            std::sync::Arc::new(CacheBinder::new(stores));
        let mut cache = SourcesConfigurator::<CacheConfig>::for_family(
            self.config.cache.clone(),
            self.is_enabled(Switch::MultiCache),
        )
        .with_connector(Some(binder))
        .must_run();
        if let Resolution::Executed(_) = self.resolve(&mut cache).await? {
            self.subsystems.cache = cache.into_installed();
        }
        Ok(())
    }

    async fn init_tables(&mut self) -> Result<(), BootstrapError> {
        if self.tables.is_empty() {
            return Ok(());
        }
        let Some(sources) = self.subsystems.database.clone() else {
            return Ok(());
        };
        let Some(initializer) = self.collaborators.tables.clone() else {
            tracing::warn!("Tables registered but no table initializer configured");
            return Ok(());
        };

        let pending: Vec<String> = self.tables.keys().cloned().collect();
        for source in pending {
            let Some(settings) = sources.get(&source) else {
                tracing::warn!(data_source = %source, "Tables registered for an unknown data source");
                continue;
            };
            let tables = self.tables.get(&source).cloned().unwrap_or_default();
            initializer
                .init_tables(settings, &tables)
                .await
                .map_err(|source_err| BootstrapError::Tables {
                    data_source: source.clone(),
                    source: source_err,
                })?;
            tracing::info!(data_source = %source, tables = tables.len(), "Tables initialized");
            self.tables.remove(&source);
        }
        Ok(())
    }

    async fn run_configurators(&mut self) -> Result<(), BootstrapError> {
        while !self.configurators.is_empty() {
            let mut configurator = self.configurators.remove(0);
            if let Err(err) = self.resolve(configurator.as_mut()).await {
                self.configurators.insert(0, configurator);
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_custom_funcs(&mut self) -> Result<(), BootstrapError> {
        while !self.remote_settings.is_empty() {
            let mut entry = self.remote_settings.remove(0);
            if let Err(err) = self.load_remote(&mut entry).await {
                self.remote_settings.insert(0, entry);
                return Err(err);
            }
        }

        while !self.custom_funcs.is_empty() {
            let mut func = self.custom_funcs.remove(0);
            if let Err(source) = func().await {
                tracing::error!(error = %source, "Custom function failed");
                self.custom_funcs.insert(0, func);
                return Err(BootstrapError::CustomFunc(source));
            }
        }
        Ok(())
    }

    async fn load_remote(&self, entry: &mut super::state::RemoteEntry) -> Result<(), BootstrapError> {
        let center = self
            .subsystems
            .center
            .clone()
            .ok_or(BootstrapError::CenterUnavailable)?;
        let group = self.config.server.name.as_str();
        let remote_err = |source: BoxError| BootstrapError::RemoteSettings {
            data_id: entry.data_id.clone(),
            source,
        };

        let content = center
            .fetch(group, &entry.data_id)
            .await
            .map_err(|err| remote_err(err.into()))?;
        let format = Format::from_name(&entry.data_id).map_err(|err| remote_err(err.into()))?;
        (entry.apply)(format, &content).map_err(remote_err)?;
        self.cache.set(group, &entry.data_id, content);
        tracing::info!(group = %group, data_id = %entry.data_id, "Remote settings loaded");

        if entry.listen {
            if let Err(err) = center.listen(group, &entry.data_id, self.cache.updates()).await {
                tracing::warn!(data_id = %entry.data_id, error = %err, "Cannot listen for settings changes");
            }
        }
        Ok(())
    }

    async fn start_server(&mut self) -> Result<(), BootstrapError> {
        self.phase = Phase::Running;
        self.publish();

        if let Some(address) = self.config.server.metrics_address.as_deref() {
            match address.parse::<SocketAddr>() {
                Ok(addr) => {
                    if let Err(err) = metrics::init_metrics(addr) {
                        tracing::warn!(address = %addr, error = %err, "Metrics exporter not started");
                    }
                }
                Err(_) => tracing::error!(metrics_address = %address, "Failed to parse metrics address"),
            }
        }
        if self.routes.is_empty() {
            tracing::warn!("No routes registered");
        }

        let server = &self.config.server;
        let plan = ServePlan {
            addr: SocketAddr::from(([0, 0, 0, 0], server.port)),
            public_url: server.http_url(),
            prefix: server.api_prefix(),
            routes: self.routes.clone(),
            middleware: self.middleware.clone(),
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            shutdown: self.shutdown.subscribe(),
        };
        tracing::info!(url = %plan.public_url, "Starting server");

        let launcher = self.collaborators.launcher.clone();
        match AssertUnwindSafe(launcher.serve(plan)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => {
                tracing::error!(error = %source, "Server stopped with an error");
                Err(BootstrapError::Server(source))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                drop(panic);
                tracing::error!(panic = %message, "Server panicked, waiting for shutdown");
                let signal = self.shutdown.subscribe();
                tokio::select! {
                    _ = signal.recv() => {},
                    _ = signals::terminate() => {},
                }
                Err(BootstrapError::ServerPanic(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
