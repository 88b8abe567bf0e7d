//! Latest-content cache for listened settings documents.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use dashmap::DashMap;
use notify::RecommendedWatcher;
use tokio::sync::mpsc;

use super::ConfigChange;

#[derive(Debug, Clone)]
pub struct CachedContent {
    pub content: String,
    /// Set when a listener delivered content that differs from the previous one.
    pub changed: bool,
    pub updated_at: SystemTime,
}

/// Shared map of `(group, data_id)` to the latest document content.
#[derive(Clone, Default)]
pub struct ContentCache {
    entries: Arc<DashMap<(String, String), CachedContent>>,
    watchers: Arc<Mutex<Vec<RecommendedWatcher>>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the content a document was resolved with.
    pub fn set(&self, group: &str, data_id: &str, content: String) {
        self.entries.insert(
            (group.to_string(), data_id.to_string()),
            CachedContent {
                content,
                changed: false,
                updated_at: SystemTime::now(),
            },
        );
    }

    /// Apply a listener notification. Returns true if the content changed.
    pub fn apply(&self, change: ConfigChange) -> bool {
        let key = (change.group, change.data_id);
        let mut entry = self.entries.entry(key.clone()).or_insert_with(|| CachedContent {
            content: String::new(),
            changed: false,
            updated_at: SystemTime::now(),
        });
        if entry.content == change.content {
            return false;
        }
        entry.content = change.content;
        entry.changed = true;
        entry.updated_at = SystemTime::now();
        tracing::info!(group = %key.0, data_id = %key.1, "Settings content changed");
        true
    }

    pub fn get(&self, group: &str, data_id: &str) -> Option<CachedContent> {
        self.entries
            .get(&(group.to_string(), data_id.to_string()))
            .map(|entry| entry.clone())
    }

    /// Return the content if it changed since the last call, clearing the flag.
    pub fn take_changed(&self, group: &str, data_id: &str) -> Option<String> {
        let mut entry = self
            .entries
            .get_mut(&(group.to_string(), data_id.to_string()))?;
        if !entry.changed {
            return None;
        }
        entry.changed = false;
        Some(entry.content.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sender whose messages are applied to this cache by a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn updates(&self) -> mpsc::UnboundedSender<ConfigChange> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cache = self.clone();
        tokio::spawn(async move {
            while let Some(change) = rx.recv().await {
                cache.apply(change);
            }
        });
        tx
    }

    /// Keep a file watcher alive as long as the cache.
    pub fn keep_watcher(&self, watcher: RecommendedWatcher) {
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.push(watcher);
        }
    }
}

impl fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
