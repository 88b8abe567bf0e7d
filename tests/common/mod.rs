//! Shared fakes for engine and client integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use service_bootstrap::config::CodecError;
use service_bootstrap::configurator::{Configurator, Location, Payload, Requirement};
use service_bootstrap::http::{Launcher, ServePlan};
use service_bootstrap::remote::{CenterConnector, ConfigCenter, ConfigChange, Instance, RemoteError};
use service_bootstrap::subsystem::{
    Connector, DatabaseConfig, NacosConfig, StoreConfig, Table, TableInitializer,
};
use service_bootstrap::BoxError;

/// Append-only event log shared between fakes and assertions.
pub type Events = Arc<Mutex<Vec<String>>>;

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn snapshot(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

pub fn push(events: &Events, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

/// Write a file into the config directory.
pub fn write_settings(dir: &Path, file: &str, content: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), content).unwrap();
}

/// In-memory config center.
#[derive(Default)]
pub struct FakeCenter {
    documents: Mutex<HashMap<(String, String), String>>,
    pub fail_fetch: AtomicBool,
    pub fail_register: AtomicBool,
    pub registered: Mutex<Vec<Instance>>,
    pub listened: Mutex<Vec<String>>,
}

impl FakeCenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, group: &str, data_id: &str, content: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert((group.to_string(), data_id.to_string()), content.to_string());
    }
}

#[async_trait]
impl ConfigCenter for FakeCenter {
    async fn fetch(&self, group: &str, data_id: &str) -> Result<String, RemoteError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::NoServer);
        }
        self.documents
            .lock()
            .unwrap()
            .get(&(group.to_string(), data_id.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                group: group.to_string(),
                data_id: data_id.to_string(),
            })
    }

    async fn listen(
        &self,
        _group: &str,
        data_id: &str,
        _updates: mpsc::UnboundedSender<ConfigChange>,
    ) -> Result<(), RemoteError> {
        self.listened.lock().unwrap().push(data_id.to_string());
        Ok(())
    }

    async fn register(&self, instance: &Instance) -> Result<(), RemoteError> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                body: "naming unavailable".into(),
            });
        }
        self.registered.lock().unwrap().push(instance.clone());
        Ok(())
    }

    async fn deregister(&self, instance: &Instance) -> Result<(), RemoteError> {
        self.registered.lock().unwrap().retain(|i| i != instance);
        Ok(())
    }
}

/// Hands out a shared [`FakeCenter`].
pub struct FakeConnector(pub Arc<FakeCenter>);

#[async_trait]
impl CenterConnector for FakeConnector {
    async fn connect(&self, _settings: &NacosConfig) -> Result<Arc<dyn ConfigCenter>, RemoteError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    Return,
    Fail,
    Panic,
    /// Serve until the plan's shutdown signal fires.
    UntilShutdown,
}

/// Launcher that records the plan instead of binding a port.
pub struct StubLauncher {
    outcome: ServeOutcome,
    events: Events,
    pub plans: Mutex<Vec<ServePlan>>,
}

impl StubLauncher {
    pub fn new(outcome: ServeOutcome, events: Events) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            events,
            plans: Mutex::new(Vec::new()),
        })
    }

    pub fn serve_count(&self) -> usize {
        self.plans.lock().unwrap().len()
    }
}

#[async_trait]
impl Launcher for StubLauncher {
    async fn serve(&self, plan: ServePlan) -> Result<(), BoxError> {
        push(&self.events, "serve");
        let signal = plan.shutdown.clone();
        self.plans.lock().unwrap().push(plan);
        match self.outcome {
            ServeOutcome::Return => Ok(()),
            ServeOutcome::UntilShutdown => {
                signal.recv().await;
                Ok(())
            }
            ServeOutcome::Fail => Err("address in use".into()),
            ServeOutcome::Panic => panic!("listener exploded"),
        }
    }
}

/// Configurator that records its settings and executions.
pub struct RecordingConfigurator {
    name: String,
    file: Option<String>,
    requirement: Requirement,
    events: Events,
    pub content: Option<String>,
    fail: bool,
}

impl RecordingConfigurator {
    pub fn new(name: &str, requirement: Requirement, events: Events) -> Self {
        Self {
            name: name.to_string(),
            file: None,
            requirement,
            events,
            content: None,
            fail: false,
        }
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Configurator for RecordingConfigurator {
    fn name(&self) -> &str {
        &self.name
    }

    fn describe(&self) -> String {
        format!("{}={:?}", self.name, self.content)
    }

    fn location(&self) -> Option<Location> {
        self.file.as_deref().map(Location::new)
    }

    fn decode(&mut self, payload: &Payload<'_>) -> Result<(), CodecError> {
        let value: toml::Value = payload.decode()?;
        self.content = value.get("value").and_then(|v| v.as_str()).map(str::to_string);
        Ok(())
    }

    fn requirement(&self) -> Requirement {
        self.requirement
    }

    async fn execute(&mut self) -> Result<(), BoxError> {
        let value = self.content.clone().unwrap_or_else(|| "default".to_string());
        push(&self.events, format!("{}:{}", self.name, value));
        if self.fail {
            return Err(format!("{} failed", self.name).into());
        }
        Ok(())
    }
}

/// Connector that counts connected sources.
pub struct CountingConnector {
    pub connected: AtomicU32,
}

impl CountingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl<T: Send + Sync> Connector<T> for CountingConnector {
    async fn connect(&self, _settings: &T) -> Result<(), BoxError> {
        self.connected.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store connector that fails for one named source.
pub struct RejectSource(pub &'static str);

#[async_trait]
impl Connector<StoreConfig> for RejectSource {
    async fn connect(&self, settings: &StoreConfig) -> Result<(), BoxError> {
        if settings.source == self.0 {
            return Err(format!("{} refused the connection", settings.source).into());
        }
        Ok(())
    }
}

pub struct NamedTable(pub &'static str);

impl Table for NamedTable {
    fn table_name(&self) -> &str {
        self.0
    }
}

/// Records `source:table` for every initialized table.
pub struct RecordingTables(pub Events);

#[async_trait]
impl TableInitializer for RecordingTables {
    async fn init_tables(
        &self,
        source: &DatabaseConfig,
        tables: &[Arc<dyn Table>],
    ) -> Result<(), BoxError> {
        for table in tables {
            push(&self.0, format!("{}:{}", source.source, table.table_name()));
        }
        Ok(())
    }
}
