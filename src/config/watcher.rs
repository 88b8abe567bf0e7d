//! Local settings file watcher.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::remote::{ConfigChange, LOCAL_GROUP};

/// Monitors one settings file and pushes its new content on every change.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<ConfigChange>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, updates: mpsc::UnboundedSender<ConfigChange>) -> Self {
        Self {
            path: path.to_path_buf(),
            updates,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.updates.clone();
        let path = self.path.clone();
        let data_id = path.display().to_string();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        match std::fs::read_to_string(&path) {
                            Ok(content) => {
                                let _ = tx.send(ConfigChange {
                                    group: LOCAL_GROUP.to_string(),
                                    data_id: data_id.clone(),
                                    content,
                                });
                            }
                            Err(e) => {
                                tracing::error!(path = %path.display(), error = %e, "Failed to read changed settings file");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Settings watcher started");
        Ok(watcher)
    }
}
