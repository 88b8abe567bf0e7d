//! Settings resolution and configurator execution.

use std::path::Path;

use crate::config::codec::Format;
use crate::config::watcher::ConfigWatcher;
use crate::configurator::{Configurator, Location, Origin, Payload, Requirement};
use crate::error::BootstrapError;
use crate::observability::metrics;
use crate::remote::{ConfigCenter, ContentCache, LOCAL_GROUP};

/// Outcome of one configurator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Executed(Origin),
    /// No settings were found and the configurator is optional.
    Skipped,
    /// Execution failed and the configurator is not required.
    Failed(Origin),
}

/// Resolves settings by precedence (remote, local, default) and runs configurators.
pub struct Resolver<'a> {
    config_dir: &'a Path,
    cache: &'a ContentCache,
    remote: Option<(&'a dyn ConfigCenter, &'a str)>,
    debug: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(config_dir: &'a Path, cache: &'a ContentCache) -> Self {
        Self {
            config_dir,
            cache,
            remote: None,
            debug: false,
        }
    }

    /// Consult `center` first, using `group` when a location names none.
    pub fn with_remote(mut self, center: &'a dyn ConfigCenter, group: &'a str) -> Self {
        self.remote = Some((center, group));
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub async fn resolve(
        &self,
        configurator: &mut dyn Configurator,
    ) -> Result<Resolution, BootstrapError> {
        let name = configurator.name().to_string();
        let requirement = configurator.requirement();

        let found = match configurator.location() {
            Some(location) => self.locate(configurator, &location, requirement).await?,
            None => None,
        };
        let origin = match found {
            Some(origin) => origin,
            None if requirement.must_run() => Origin::Default,
            None => {
                tracing::debug!(configurator = %name, "No settings found, configurator skipped");
                metrics::record_configurator(&name, &Origin::Default, "skipped");
                return Ok(Resolution::Skipped);
            }
        };

        if self.debug {
            tracing::info!(configurator = %name, origin = %origin, settings = %configurator.describe(), "Configurator settings");
        }

        match configurator.execute().await {
            Ok(()) => {
                tracing::info!(configurator = %name, origin = %origin, "Configurator executed");
                metrics::record_configurator(&name, &origin, "executed");
                Ok(Resolution::Executed(origin))
            }
            Err(source) if requirement.is_fatal() => {
                tracing::error!(configurator = %name, origin = %origin, error = %source, "Required configurator failed");
                metrics::record_configurator(&name, &origin, "failed");
                Err(BootstrapError::Configurator {
                    name,
                    origin,
                    source,
                })
            }
            Err(source) => {
                tracing::error!(configurator = %name, origin = %origin, error = %source, "Configurator failed, subsystem left uninitialized");
                metrics::record_configurator(&name, &origin, "failed");
                Ok(Resolution::Failed(origin))
            }
        }
    }

    async fn locate(
        &self,
        configurator: &mut dyn Configurator,
        location: &Location,
        requirement: Requirement,
    ) -> Result<Option<Origin>, BootstrapError> {
        if let Some((center, default_group)) = self.remote {
            let group = location.group.as_deref().unwrap_or(default_group);
            match center.fetch(group, &location.data_id).await {
                Ok(content) => {
                    let origin = Origin::Remote {
                        group: group.to_string(),
                        data_id: location.data_id.clone(),
                    };
                    let format = Format::from_name(&location.data_id);
                    if self.apply(configurator, format, &content, &origin, requirement)? {
                        self.cache.set(group, &location.data_id, content);
                        if location.listen {
                            self.listen_remote(center, group, &location.data_id).await;
                        }
                        return Ok(Some(origin));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        configurator = %configurator.name(),
                        group = %group,
                        data_id = %location.data_id,
                        error = %err,
                        "Remote settings unavailable, falling back to local file"
                    );
                }
            }
        }

        let path = self.config_dir.join(&location.file);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let origin = Origin::Local(path.clone());
                let format = Format::from_path(&path);
                if self.apply(configurator, format, &content, &origin, requirement)? {
                    if location.listen {
                        self.watch_local(&path, content);
                    }
                    return Ok(Some(origin));
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(configurator = %configurator.name(), path = %path.display(), "No local settings file");
            }
            Err(err) => {
                tracing::warn!(configurator = %configurator.name(), path = %path.display(), error = %err, "Local settings file unreadable");
            }
        }

        Ok(None)
    }

    /// Decode into the configurator. `Ok(false)` means fall through to the next origin.
    fn apply(
        &self,
        configurator: &mut dyn Configurator,
        format: Result<Format, crate::config::CodecError>,
        content: &str,
        origin: &Origin,
        requirement: Requirement,
    ) -> Result<bool, BootstrapError> {
        let decoded = format.and_then(|format| configurator.decode(&Payload { format, content }));
        match decoded {
            Ok(()) => Ok(true),
            Err(source) if requirement.is_fatal() => Err(BootstrapError::Decode {
                name: configurator.name().to_string(),
                origin: origin.clone(),
                source,
            }),
            Err(err) => {
                tracing::warn!(configurator = %configurator.name(), origin = %origin, error = %err, "Settings could not be decoded");
                Ok(false)
            }
        }
    }

    async fn listen_remote(&self, center: &dyn ConfigCenter, group: &str, data_id: &str) {
        if let Err(err) = center.listen(group, data_id, self.cache.updates()).await {
            tracing::warn!(group = %group, data_id = %data_id, error = %err, "Cannot listen for settings changes");
        }
    }

    fn watch_local(&self, path: &Path, content: String) {
        let data_id = path.display().to_string();
        self.cache.set(LOCAL_GROUP, &data_id, content);
        match ConfigWatcher::new(path, self.cache.updates()).run() {
            Ok(watcher) => self.cache.keep_watcher(watcher),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Cannot watch settings file");
            }
        }
    }
}
