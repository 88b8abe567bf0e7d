//! End-to-end bootstrap runs against fake collaborators.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::get;
use serde::Deserialize;
use tempfile::TempDir;

use common::*;
use service_bootstrap::config::CONFIG_FILE;
use service_bootstrap::engine::START_SERVER;
use service_bootstrap::{BootstrapError, BoxError, Engine, EngineBuilder, Phase, Requirement, Switch};

fn builder(dir: &TempDir, launcher: Arc<StubLauncher>) -> EngineBuilder {
    Engine::builder().config_dir(dir.path()).launcher(launcher)
}

fn remote_builder(dir: &TempDir, launcher: Arc<StubLauncher>, center: &Arc<FakeCenter>) -> EngineBuilder {
    builder(dir, launcher)
        .enable(Switch::RemoteConfig)
        .center_connector(Arc::new(FakeConnector(center.clone())))
}

#[tokio::test]
async fn test_run_creates_default_config_and_serves() {
    let dir = TempDir::new().unwrap();
    let log = events();
    let launcher = StubLauncher::new(ServeOutcome::Return, log.clone());
    let mut engine = builder(&dir, launcher.clone()).build();
    engine
        .add_router(|router| router.route("/ping", get(|| async { "pong" })))
        .unwrap();

    engine.run().await.unwrap();

    assert!(dir.path().join(CONFIG_FILE).exists());
    assert_eq!(engine.phase(), Phase::Running);
    assert!(!engine.config().server.host.is_empty());

    let plans = launcher.plans.lock().unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].prefix, "/app");
    assert_eq!(plans[0].addr.port(), 8888);
    assert_eq!(plans[0].routes.len(), 1);
}

#[tokio::test]
async fn test_phases_run_caller_work_in_order() {
    let dir = TempDir::new().unwrap();
    let log = events();
    let launcher = StubLauncher::new(ServeOutcome::Return, log.clone());
    let mut engine = builder(&dir, launcher).build();

    engine
        .add_configurator(RecordingConfigurator::new("audit", Requirement::Unconditional, log.clone()))
        .unwrap();
    engine
        .add_configurator(RecordingConfigurator::new("search", Requirement::Optional, log.clone()).with_file("search.toml"))
        .unwrap();
    let func_log = log.clone();
    engine
        .add_custom_func(move || {
            let log = func_log.clone();
            async move {
                push(&log, "func");
                Ok(())
            }
        })
        .unwrap();
    let task_log = log.clone();
    engine
        .add_queue_task("warm_up", move || {
            let log = task_log.clone();
            async move {
                push(&log, "warm_up");
                Ok(())
            }
        })
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(snapshot(&log), vec!["audit:default", "func", "warm_up", "serve"]);
    assert!(engine.queued_tasks().await.is_empty());
}

#[tokio::test]
async fn test_local_file_feeds_configurator() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "search.toml", "value = \"local\"\n");
    let log = events();
    let launcher = StubLauncher::new(ServeOutcome::Return, log.clone());
    let mut engine = builder(&dir, launcher).build();
    engine
        .add_configurator(RecordingConfigurator::new("search", Requirement::Optional, log.clone()).with_file("search.toml"))
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(snapshot(&log), vec!["search:local", "serve"]);
}

#[tokio::test]
async fn test_mutators_rejected_once_running() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher.clone()).build();
    engine.run().await.unwrap();

    assert!(matches!(
        engine.add_router(|router| router),
        Err(BootstrapError::AlreadyRunning)
    ));
    assert!(matches!(
        engine.add_custom_func(|| async { Ok(()) }),
        Err(BootstrapError::AlreadyRunning)
    ));
    assert!(matches!(engine.enable(Switch::Debug), Err(BootstrapError::AlreadyRunning)));
    assert!(matches!(engine.run().await, Err(BootstrapError::AlreadyRunning)));
    assert_eq!(launcher.serve_count(), 1);
}

#[tokio::test]
async fn test_queue_resumes_from_failed_task() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher.clone()).build();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    engine
        .add_queue_task("flaky", move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    return Err(BoxError::from("cache not warm"));
                }
                Ok(())
            }
        })
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Task { ref task, .. } if task == "flaky"));
    assert_eq!(engine.phase(), Phase::CustomFuncsRun);
    assert_eq!(engine.queued_tasks().await, vec!["flaky".to_string(), START_SERVER.to_string()]);
    assert_eq!(launcher.serve_count(), 0);

    engine.run().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(launcher.serve_count(), 1);
    assert!(engine.is_running());
}

#[tokio::test]
async fn test_custom_func_failure_is_retried_on_next_run() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher.clone()).enable(Switch::Queue).build();

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    engine
        .add_custom_func(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    return Err(BoxError::from("seed data missing"));
                }
                Ok(())
            }
        })
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::CustomFunc(_)));
    assert_eq!(engine.phase(), Phase::ConfiguratorsRun);

    engine.run().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(launcher.serve_count(), 1);
}

#[tokio::test]
async fn test_remote_config_registers_instance() {
    let dir = TempDir::new().unwrap();
    let center = FakeCenter::new();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = remote_builder(&dir, launcher, &center).build();

    engine.run().await.unwrap();

    assert!(engine.subsystems().center_initialized());
    let registered = center.registered.lock().unwrap();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].name, "app");
    assert_eq!(registered[0].port, 8888);
}

#[tokio::test]
async fn test_registration_failure_aborts_startup() {
    let dir = TempDir::new().unwrap();
    let center = FakeCenter::new();
    center.fail_register.store(true, Ordering::SeqCst);
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = remote_builder(&dir, launcher.clone(), &center).build();

    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Register { .. }));
    assert_eq!(engine.phase(), Phase::Unconfigured);
    assert_eq!(launcher.serve_count(), 0);
}

#[tokio::test]
async fn test_remote_settings_win_over_local_file() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "store.toml", "enable = true\nhost = \"local-redis\"\n");
    let center = FakeCenter::new();
    center.put("app", "store.toml", "enable = true\nhost = \"remote-redis\"\n");
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = remote_builder(&dir, launcher, &center).build();

    engine.run().await.unwrap();

    let stores = engine.subsystems().store.clone().unwrap();
    assert_eq!(stores.primary().host, "remote-redis");
    assert!(engine.content_cache().get("app", "store.toml").is_some());
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_local_file() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "store.toml", "enable = true\nhost = \"local-redis\"\n");
    let center = FakeCenter::new();
    center.fail_fetch.store(true, Ordering::SeqCst);
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = remote_builder(&dir, launcher, &center).build();

    engine.run().await.unwrap();

    let stores = engine.subsystems().store.clone().unwrap();
    assert_eq!(stores.primary().host, "local-redis");
}

#[tokio::test]
async fn test_multi_store_sources_and_primary() {
    let dir = TempDir::new().unwrap();
    write_settings(
        dir.path(),
        "store.toml",
        r#"
[[source]]
source = "sessions"
enable = true
host = "redis-sessions"

[[source]]
source = "default"
enable = true
host = "redis-main"

[[source]]
source = "rate_limits"
enable = true
host = "redis-limits"
"#,
    );
    let connector = CountingConnector::new();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher)
        .enable(Switch::MultiStore)
        .store_connector(connector.clone())
        .build();

    engine.run().await.unwrap();

    let stores = engine.subsystems().store.clone().unwrap();
    assert_eq!(stores.len(), 3);
    assert_eq!(stores.primary().source, "default");
    assert_eq!(stores.primary().host, "redis-main");
    assert_eq!(connector.connected.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_multi_source_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher.clone())
        .enable(Switch::MultiDatabase)
        .build();

    engine.run().await.unwrap();

    assert!(!engine.subsystems().database_initialized());
    assert_eq!(launcher.serve_count(), 1);
}

#[tokio::test]
async fn test_failed_store_source_left_out_of_family() {
    let dir = TempDir::new().unwrap();
    write_settings(
        dir.path(),
        "store.toml",
        r#"
[[source]]
source = "default"
enable = true
host = "redis-main"

[[source]]
source = "bad"
enable = true
host = "redis-gone"
"#,
    );
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher.clone())
        .enable(Switch::MultiStore)
        .store_connector(Arc::new(RejectSource("bad")))
        .build();

    engine.run().await.unwrap();

    let stores = engine.subsystems().store.clone().unwrap();
    assert_eq!(stores.names(), vec!["default"]);
    assert_eq!(stores.primary().host, "redis-main");
    assert_eq!(launcher.serve_count(), 1);
}

#[tokio::test]
async fn test_store_without_cache_file_gets_default_cache() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "store.toml", "enable = true\n");
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher).build();

    engine.run().await.unwrap();

    assert!(engine.subsystems().store_initialized());
    let caches = engine.subsystems().cache.clone().unwrap();
    assert_eq!(caches.primary().prefix, "cache");
}

#[tokio::test]
async fn test_cache_skipped_without_store() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "cache.toml", "prefix = \"orders\"\n");
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher).build();

    engine.run().await.unwrap();

    assert!(!engine.subsystems().store_initialized());
    assert!(!engine.subsystems().cache_initialized());
}

#[tokio::test]
async fn test_cache_bound_to_store() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "store.toml", "enable = true\n");
    write_settings(dir.path(), "cache.toml", "prefix = \"orders\"\n");
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher).build();

    engine.run().await.unwrap();

    let caches = engine.subsystems().cache.clone().unwrap();
    assert_eq!(caches.primary().prefix, "orders");
}

#[tokio::test]
async fn test_tables_initialized_on_default_source() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "database.toml", "enable = true\nhost = \"db\"\ndatabase = \"orders\"\n");
    let log = events();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher)
        .table_initializer(Arc::new(RecordingTables(log.clone())))
        .build();
    engine.add_table(Arc::new(NamedTable("users"))).unwrap();
    engine.add_table(Arc::new(NamedTable("orders"))).unwrap();

    engine.run().await.unwrap();

    assert!(engine.subsystems().database_initialized());
    assert_eq!(snapshot(&log), vec!["default:users", "default:orders"]);
}

#[tokio::test]
async fn test_malformed_log_settings_abort_startup() {
    let dir = TempDir::new().unwrap();
    write_settings(dir.path(), "log.toml", "level = [\n");
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher).build();

    let err = engine.run().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Decode { ref name, .. } if name == "log"));
    assert_eq!(engine.phase(), Phase::ConfigLoaded);
}

#[tokio::test]
async fn test_server_error_is_returned() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Fail, events());
    let mut engine = builder(&dir, launcher).build();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Server(_)));
    assert!(engine.is_running());
}

#[tokio::test]
async fn test_server_panic_parks_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Panic, events());
    let mut engine = builder(&dir, launcher).build();

    let shutdown = engine.shutdown();
    let trigger = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.trigger();
    });

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::ServerPanic(ref message) if message.contains("listener exploded")));
    trigger.await.unwrap();
}

#[derive(Debug, Deserialize)]
struct Limits {
    max_connections: u32,
}

#[tokio::test]
async fn test_remote_settings_require_center() {
    let dir = TempDir::new().unwrap();
    let launcher = StubLauncher::new(ServeOutcome::Return, events());
    let mut engine = builder(&dir, launcher).build();
    engine
        .load_remote_settings("limits.json", false, |_limits: Limits| Ok(()))
        .unwrap();

    let err = engine.run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::CenterUnavailable));
    assert_eq!(engine.phase(), Phase::ConfiguratorsRun);
}

#[tokio::test]
async fn test_remote_settings_applied_before_custom_funcs() {
    let dir = TempDir::new().unwrap();
    let center = FakeCenter::new();
    center.put("app", "limits.json", r#"{"max_connections": 64}"#);
    let log = events();
    let launcher = StubLauncher::new(ServeOutcome::Return, log.clone());
    let mut engine = remote_builder(&dir, launcher, &center).build();

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    engine
        .load_remote_settings("limits.json", true, move |limits: Limits| {
            *sink.lock().unwrap() = Some(limits.max_connections);
            Ok(())
        })
        .unwrap();
    let func_log = log.clone();
    let observed = seen.clone();
    engine
        .add_custom_func(move || {
            let log = func_log.clone();
            let value = *observed.lock().unwrap();
            async move {
                push(&log, format!("func:{value:?}"));
                Ok(())
            }
        })
        .unwrap();

    engine.run().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(64));
    assert_eq!(snapshot(&log), vec!["func:Some(64)", "serve"]);
    assert_eq!(center.listened.lock().unwrap().clone(), vec!["limits.json".to_string()]);
    assert!(engine.content_cache().get("app", "limits.json").is_some());
}
