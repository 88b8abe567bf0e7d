//! Bootstrap engine.
//!
//! # Data Flow
//! ```text
//! EngineBuilder (switches, config dir, collaborators)
//!     → Engine (registration: configurators, functions, routes, tables, queue tasks)
//!     → run()
//!         direct mode: load_config → init_basic → run_configurators
//!                      → run_custom_funcs → start_server
//!         queue mode:  TaskQueue<EngineState> with the same five tasks plus
//!                      caller tasks anchored relative to them
//! ```
//!
//! # Design Decisions
//! - The engine is an explicit context object; `install()` offers a process-wide one
//! - `EngineHandle` reaches shutdown, subsystems and the content cache without the engine lock
//! - Every mutator checks the phase tag and rejects calls once running
//! - Phase faults are returned, never panicked; the binary decides the exit

mod handle;
mod phase;
mod startup;
mod state;

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use axum::Router;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::{Format, DEFAULT_CONFIG_DIR};
use crate::configurator::{Configurator, DEFAULT_SOURCE};
use crate::error::{BootstrapError, BoxError};
use crate::http::{HttpServer, Launcher};
use crate::lifecycle::Shutdown;
use crate::remote::{CenterConnector, NacosConnector};
use crate::subsystem::{Connector, DatabaseConfig, StoreConfig, Table, TableInitializer};
use crate::task::{TaskError, TaskList, TaskQueue, TaskResult};

pub use handle::EngineHandle;
pub use phase::{Phase, INIT_BASIC, LOAD_CONFIG, RUN_CONFIGURATORS, RUN_CUSTOM_FUNCS, START_SERVER};
pub use state::{Collaborators, CustomFunc, EngineState};

use state::RemoteEntry;

static ENGINE: OnceLock<Mutex<Engine>> = OnceLock::new();
static HANDLE: OnceLock<EngineHandle> = OnceLock::new();

/// Named feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    /// Run the phases through a task queue.
    Queue,
    /// Connect the config center and resolve settings remotely first.
    RemoteConfig,
    MultiDatabase,
    MultiStore,
    MultiCache,
    /// Log every configurator's settings.
    Debug,
    /// Take the listen port from `PORT`.
    EnvPort,
}

/// Where `insert_queue_task` places a task.
#[derive(Debug, Clone, Copy)]
pub enum Anchor<'a> {
    Before(&'a str),
    After(&'a str),
}

pub struct EngineBuilder {
    config_dir: PathBuf,
    switches: HashSet<Switch>,
    collaborators: Collaborators,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            switches: HashSet::new(),
            collaborators: Collaborators {
                center: Arc::new(NacosConnector),
                launcher: Arc::new(HttpServer),
                database: None,
                store: None,
                tables: None,
            },
        }
    }

    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn enable(mut self, switch: Switch) -> Self {
        self.switches.insert(switch);
        self
    }

    pub fn center_connector(mut self, connector: Arc<dyn CenterConnector>) -> Self {
        self.collaborators.center = connector;
        self
    }

    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.collaborators.launcher = launcher;
        self
    }

    pub fn database_connector(mut self, connector: Arc<dyn Connector<DatabaseConfig>>) -> Self {
        self.collaborators.database = Some(connector);
        self
    }

    pub fn store_connector(mut self, connector: Arc<dyn Connector<StoreConfig>>) -> Self {
        self.collaborators.store = Some(connector);
        self
    }

    pub fn table_initializer(mut self, initializer: Arc<dyn TableInitializer>) -> Self {
        self.collaborators.tables = Some(initializer);
        self
    }

    pub fn build(self) -> Engine {
        let queue_mode = self.switches.contains(&Switch::Queue);
        let mut engine = Engine {
            state: EngineState::new(self.config_dir, self.switches, self.collaborators),
            queue: None,
        };
        if queue_mode {
            engine.queue_mut();
        }
        engine
    }

    /// Install the process-wide engine. Only the first call builds one;
    /// later calls return the existing engine and drop this builder.
    pub fn install(self) -> &'static Mutex<Engine> {
        let mut built = false;
        let engine = ENGINE.get_or_init(|| {
            built = true;
            let engine = self.build();
            let _ = HANDLE.set(engine.handle());
            Mutex::new(engine)
        });
        if !built {
            tracing::debug!("Engine already installed, builder ignored");
        }
        engine
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The bootstrap engine: phase state plus the optional task queue.
pub struct Engine {
    state: EngineState,
    queue: Option<TaskQueue<EngineState>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The process-wide engine, if one was installed.
    pub fn shared() -> Option<&'static Mutex<Engine>> {
        ENGINE.get()
    }

    /// Handles of the process-wide engine. Unlike [`Engine::shared`] this
    /// needs no lock, so it works while the installed engine is serving.
    pub fn shared_handle() -> Option<EngineHandle> {
        HANDLE.get().cloned()
    }

    pub fn handle(&self) -> EngineHandle {
        self.state.handle()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_enabled(&self, switch: Switch) -> bool {
        self.state.is_enabled(switch)
    }

    pub fn config(&self) -> &crate::config::AppConfig {
        self.state.config()
    }

    pub fn config_path(&self, file: impl AsRef<std::path::Path>) -> PathBuf {
        self.state.config_path(file)
    }

    pub fn subsystems(&self) -> &crate::subsystem::Subsystems {
        self.state.subsystems()
    }

    pub fn content_cache(&self) -> &crate::remote::ContentCache {
        self.state.content_cache()
    }

    /// Handle that stops the server (or a parked engine) when triggered.
    pub fn shutdown(&self) -> Shutdown {
        self.state.shutdown()
    }

    /// Remaining queue task names, head to tail. Empty outside queue mode.
    pub async fn queued_tasks(&self) -> Vec<String> {
        match &self.queue {
            Some(queue) => queue.names().await,
            None => Vec::new(),
        }
    }

    pub fn enable(&mut self, switch: Switch) -> Result<(), BootstrapError> {
        self.state.ensure_not_running()?;
        if switch == Switch::Queue {
            self.queue_mut();
        } else {
            self.state.switches.insert(switch);
        }
        Ok(())
    }

    pub fn set_config_dir(&mut self, dir: impl Into<PathBuf>) -> Result<(), BootstrapError> {
        self.state.ensure_not_running()?;
        self.state.config_dir = dir.into();
        Ok(())
    }

    pub fn add_custom_func<F, Fut>(&mut self, mut func: F) -> Result<(), BootstrapError>
    where
        F: FnMut() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.state.ensure_not_running()?;
        self.state
            .custom_funcs
            .push(Box::new(move || -> BoxFuture<'static, TaskResult> { Box::pin(func()) }));
        Ok(())
    }

    pub fn add_configurator<C>(&mut self, configurator: C) -> Result<(), BootstrapError>
    where
        C: Configurator + 'static,
    {
        self.state.ensure_not_running()?;
        self.state.configurators.push(Box::new(configurator));
        Ok(())
    }

    /// Register a table on the `default` data source.
    pub fn add_table(&mut self, table: Arc<dyn Table>) -> Result<(), BootstrapError> {
        self.add_source_table(DEFAULT_SOURCE, table)
    }

    pub fn add_source_table(
        &mut self,
        source: impl Into<String>,
        table: Arc<dyn Table>,
    ) -> Result<(), BootstrapError> {
        self.state.ensure_not_running()?;
        self.state.tables.entry(source.into()).or_default().push(table);
        Ok(())
    }

    /// Register routes mounted under the server prefix.
    pub fn add_router<F>(&mut self, routes: F) -> Result<(), BootstrapError>
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.state.ensure_not_running()?;
        self.state.routes.push(Arc::new(routes));
        Ok(())
    }

    /// Register a closure wrapping the whole application router.
    pub fn add_middleware<F>(&mut self, middleware: F) -> Result<(), BootstrapError>
    where
        F: Fn(Router) -> Router + Send + Sync + 'static,
    {
        self.state.ensure_not_running()?;
        self.state.middleware.push(Arc::new(middleware));
        Ok(())
    }

    /// Queue a task right before the server starts. Forces queue mode.
    pub fn add_queue_task<F, Fut>(
        &mut self,
        name: impl Into<String>,
        task: F,
    ) -> Result<bool, BootstrapError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.insert_queue_task(name, Anchor::Before(START_SERVER), task)
    }

    /// Queue a task relative to any existing task. Forces queue mode.
    pub fn insert_queue_task<F, Fut>(
        &mut self,
        name: impl Into<String>,
        anchor: Anchor<'_>,
        task: F,
    ) -> Result<bool, BootstrapError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.state.ensure_not_running()?;
        let name = name.into();
        let queue = self.queue_mut();
        let action = ignore_context(task);
        let inserted = match anchor {
            Anchor::Before(target) => queue.add_before(name.as_str(), action, target),
            Anchor::After(target) => queue.add_after(name.as_str(), action, target),
        };
        if !inserted {
            let cause = if name.is_empty() {
                "the name is required"
            } else {
                "a task with this name is already queued"
            };
            tracing::error!(task = %name, cause, "Queue task not added");
        }
        Ok(inserted)
    }

    /// Decode a settings file from the config directory right away.
    pub fn load_local_settings<T: DeserializeOwned>(
        &self,
        file: impl AsRef<std::path::Path>,
    ) -> Result<T, BootstrapError> {
        let path = self.state.config_path(file);
        crate::config::loader::read_file(&path)
            .map_err(|source| BootstrapError::Config { path, source })
    }

    /// Fetch a document from the config center before custom functions run,
    /// decode it and hand it to `apply`.
    pub fn load_remote_settings<T, F>(
        &mut self,
        data_id: impl Into<String>,
        listen: bool,
        mut apply: F,
    ) -> Result<(), BootstrapError>
    where
        T: DeserializeOwned,
        F: FnMut(T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.state.ensure_not_running()?;
        self.state.remote_settings.push(RemoteEntry {
            data_id: data_id.into(),
            listen,
            apply: Box::new(move |format: Format, content: &str| {
                apply(format.decode::<T>(content)?)
            }),
        });
        Ok(())
    }

    /// Run the bootstrap. Returns when the server stops or a phase fails.
    pub async fn run(&mut self) -> Result<(), BootstrapError> {
        self.state.ensure_not_running()?;

        let Some(queue) = &self.queue else {
            for phase in Phase::SEQUENCE {
                self.state.run_phase(phase).await?;
            }
            return Ok(());
        };

        let names = queue.names().await;
        tracing::info!(tasks = ?names, "Running bootstrap queue");
        queue
            .execute(&mut self.state)
            .await
            .map_err(|TaskError { task, source }| match source.downcast::<BootstrapError>() {
                Ok(err) => *err,
                Err(source) => BootstrapError::Task { task, source },
            })
    }

    /// The engine's queue, created with the five phases on first use.
    fn queue_mut(&mut self) -> &mut TaskList<EngineState> {
        self.state.switches.insert(Switch::Queue);
        let queue = self.queue.get_or_insert_with(|| {
            let mut list = TaskList::new();
            for phase in Phase::SEQUENCE {
                if let Some(name) = phase.task_name() {
                    list.add_tail(name, phase_task(phase));
                }
            }
            TaskQueue::from(list)
        });
        queue.get_mut()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("queue", &self.queue.is_some())
            .finish()
    }
}

fn phase_task(
    phase: Phase,
) -> impl for<'a> FnMut(&'a mut EngineState) -> BoxFuture<'a, TaskResult> + Send + 'static {
    move |state| Box::pin(async move { state.run_phase(phase).await.map_err(BoxError::from) })
}

fn ignore_context<F, Fut>(
    mut task: F,
) -> impl for<'a> FnMut(&'a mut EngineState) -> BoxFuture<'a, TaskResult> + Send + 'static
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    move |_state| Box::pin(task())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_mode_preloads_phases() {
        let engine = Engine::builder().enable(Switch::Queue).build();
        assert_eq!(
            engine.queued_tasks().await,
            vec![LOAD_CONFIG, INIT_BASIC, RUN_CONFIGURATORS, RUN_CUSTOM_FUNCS, START_SERVER]
        );
    }

    #[tokio::test]
    async fn test_queue_task_lands_before_start_server() {
        let mut engine = Engine::builder().build();
        assert!(!engine.is_enabled(Switch::Queue));

        assert!(engine.add_queue_task("warm_up", || async { Ok(()) }).unwrap());
        assert!(engine.is_enabled(Switch::Queue));
        assert!(!engine.add_queue_task("warm_up", || async { Ok(()) }).unwrap());
        assert!(!engine.add_queue_task("", || async { Ok(()) }).unwrap());

        engine
            .insert_queue_task("migrate", Anchor::After(LOAD_CONFIG), || async { Ok(()) })
            .unwrap();
        assert_eq!(
            engine.queued_tasks().await,
            vec![LOAD_CONFIG, "migrate", INIT_BASIC, RUN_CONFIGURATORS, RUN_CUSTOM_FUNCS, "warm_up", START_SERVER]
        );
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_unnamed_queue_task_is_logged() {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mut engine = Engine::builder().build();
        let added = tracing::subscriber::with_default(subscriber, || {
            engine.add_queue_task("", || async { Ok(()) }).unwrap()
        });

        assert!(!added);
        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Queue task not added"));
        assert!(output.contains("the name is required"));
    }

    #[tokio::test]
    async fn test_phase_out_of_order_is_rejected() {
        let mut engine = Engine::builder().build();
        let err = engine.state.run_phase(Phase::ConfiguratorsRun).await.unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::PhaseOrder {
                expected: Phase::BasicInitialized,
                current: Phase::Unconfigured,
                ..
            }
        ));
        assert_eq!(engine.phase(), Phase::Unconfigured);
    }
}
