//! Multi-source settings shared by the database, store and cache families.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Name of the source preferred as primary.
pub const DEFAULT_SOURCE: &str = "default";

/// Settings of one source inside a subsystem family.
pub trait SourceSettings:
    Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Family name, e.g. `database`.
    const FAMILY: &'static str;

    /// Dedicated settings file, e.g. `database.toml`.
    const FILE: &'static str;

    fn source(&self) -> &str;

    fn enabled(&self) -> bool;

    /// Rendering for logs with secrets masked.
    fn describe(&self) -> String;

    /// Settings-level checks run before connecting.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    /// Source used when a multi-source family is configured with an empty list.
    fn fallback() -> Option<Self> {
        None
    }
}

/// Ordered collection of sources for one family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sources<T>(Vec<T>);

impl<T> Default for Sources<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T: SourceSettings> Sources<T> {
    pub fn new(sources: Vec<T>) -> Self {
        Self(sources)
    }

    /// Single-source settings normalized into a one-element collection.
    pub fn single(settings: T) -> Self {
        Self(vec![settings])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }

    pub fn enabled(&self) -> impl Iterator<Item = &T> {
        self.0.iter().filter(|s| s.enabled())
    }

    /// The enabled source named `default`, otherwise the first enabled one.
    pub fn primary(&self) -> Option<&T> {
        self.enabled()
            .find(|s| s.source() == DEFAULT_SOURCE)
            .or_else(|| self.enabled().next())
    }

    pub fn describe(&self) -> String {
        let items: Vec<String> = self.0.iter().map(SourceSettings::describe).collect();
        format!("[{}]", items.join(", "))
    }
}

/// File layout of a multi-source settings file: `[[source]]` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceList<T> {
    #[serde(default = "Vec::new")]
    pub source: Vec<T>,
}

/// Installed sources of a family plus its primary.
#[derive(Debug, Clone)]
pub struct SourceSet<T> {
    entries: Vec<T>,
    primary: usize,
}

impl<T: SourceSettings> SourceSet<T> {
    /// Enabled sources of `sources`; `None` when nothing is enabled.
    pub fn from_sources(sources: &Sources<T>) -> Option<Self> {
        let entries: Vec<T> = sources.enabled().cloned().collect();
        if entries.is_empty() {
            return None;
        }
        let primary = entries
            .iter()
            .position(|s| s.source() == DEFAULT_SOURCE)
            .unwrap_or(0);
        Some(Self { entries, primary })
    }

    pub fn primary(&self) -> &T {
        &self.entries[self.primary]
    }

    pub fn get(&self, source: &str) -> Option<&T> {
        self.entries.iter().find(|s| s.source() == source)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.get(source).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|s| s.source()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}
