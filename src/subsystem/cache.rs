//! Cache settings and the binder that attaches caches to store sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Connector, StoreConfig};
use crate::configurator::{SourceSet, SourceSettings, DEFAULT_SOURCE};
use crate::error::BoxError;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub source: String,
    /// Key prefix.
    pub prefix: String,
    /// Value codec name.
    pub codec: String,
    /// Store source backing this cache; defaults to `source`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            prefix: "cache".to_string(),
            codec: "json".to_string(),
            store: None,
        }
    }
}

impl CacheConfig {
    pub fn store_source(&self) -> &str {
        self.store.as_deref().unwrap_or(&self.source)
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

impl SourceSettings for CacheConfig {
    const FAMILY: &'static str = "cache";
    const FILE: &'static str = "cache.toml";

    fn source(&self) -> &str {
        &self.source
    }

    fn enabled(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!(
            "{}=prefix:{} codec:{} store:{}",
            self.source,
            self.prefix,
            self.codec,
            self.store_source()
        )
    }

    fn check(&self) -> Result<(), String> {
        if self.prefix.is_empty() {
            return Err(format!("cache source `{}` needs a key prefix", self.source));
        }
        Ok(())
    }

    fn fallback() -> Option<Self> {
        Some(Self::default())
    }
}

/// Verifies each cache is backed by an initialized store source.
#[derive(Debug, Clone)]
pub struct CacheBinder {
    stores: SourceSet<StoreConfig>,
}

impl CacheBinder {
    pub fn new(stores: SourceSet<StoreConfig>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl Connector<CacheConfig> for CacheBinder {
    async fn connect(&self, settings: &CacheConfig) -> Result<(), BoxError> {
        let store = settings.store_source();
        if !self.stores.contains(store) {
            return Err(format!(
                "cache `{}` needs store source `{}`, initialized: {:?}",
                settings.source,
                store,
                self.stores.names()
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurator::Sources;

    fn stores(names: &[&str]) -> SourceSet<StoreConfig> {
        let sources = names
            .iter()
            .map(|name| StoreConfig {
                source: name.to_string(),
                enable: true,
                ..StoreConfig::default()
            })
            .collect();
        SourceSet::from_sources(&Sources::new(sources)).unwrap()
    }

    #[tokio::test]
    async fn test_binder_requires_matching_store() {
        let binder = CacheBinder::new(stores(&["default", "session"]));

        assert!(binder.connect(&CacheConfig::default()).await.is_ok());

        let session = CacheConfig {
            source: "users".into(),
            store: Some("session".into()),
            ..CacheConfig::default()
        };
        assert!(binder.connect(&session).await.is_ok());

        let orphan = CacheConfig {
            source: "orphan".into(),
            ..CacheConfig::default()
        };
        assert!(binder.connect(&orphan).await.is_err());
    }

    #[test]
    fn test_key_uses_prefix() {
        assert_eq!(CacheConfig::default().key("user:1"), "cache:user:1");
    }
}
