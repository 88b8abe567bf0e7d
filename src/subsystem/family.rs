//! Generic configurator for multi-source families.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::Connector;
use crate::config::CodecError;
use crate::configurator::{
    Configurator, Location, Payload, Requirement, SourceList, SourceSet, SourceSettings, Sources,
};
use crate::error::BoxError;

/// How a family's settings are supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One source in the family file; skipped when the file is absent.
    Single,
    /// A `[[source]]` list in the family file; skipped when the file is absent.
    Multi,
    /// Already read from the main configuration file.
    Preloaded,
}

/// Resolves and connects every source of one family.
pub struct SourcesConfigurator<T: SourceSettings> {
    shape: Shape,
    sources: Sources<T>,
    connector: Option<Arc<dyn Connector<T>>>,
    requirement: Option<Requirement>,
    installed: Option<SourceSet<T>>,
}

impl<T: SourceSettings> SourcesConfigurator<T> {
    pub fn single() -> Self {
        Self::with_shape(Shape::Single, Sources::single(T::default()))
    }

    pub fn multi() -> Self {
        Self::with_shape(Shape::Multi, Sources::default())
    }

    pub fn preloaded(sources: Sources<T>) -> Self {
        Self::with_shape(Shape::Preloaded, sources)
    }

    /// Sections present in the main file win; otherwise the switch picks the shape.
    pub fn for_family(preloaded: Option<Sources<T>>, multi: bool) -> Self {
        match preloaded {
            Some(sources) => Self::preloaded(sources),
            None if multi => Self::multi(),
            None => Self::single(),
        }
    }

    fn with_shape(shape: Shape, sources: Sources<T>) -> Self {
        Self {
            shape,
            sources,
            connector: None,
            requirement: None,
            installed: None,
        }
    }

    pub fn with_connector(mut self, connector: Option<Arc<dyn Connector<T>>>) -> Self {
        self.connector = connector;
        self
    }

    /// Run even when no settings file is found, with default settings.
    pub fn must_run(mut self) -> Self {
        self.requirement = Some(Requirement::Unconditional);
        self
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Normalized settings; single mode yields a one-element collection.
    pub fn sources(&self) -> &Sources<T> {
        &self.sources
    }

    pub fn installed(&self) -> Option<&SourceSet<T>> {
        self.installed.as_ref()
    }

    pub fn into_installed(self) -> Option<SourceSet<T>> {
        self.installed
    }

    async fn connect(&self, settings: &T) -> Result<(), BoxError> {
        settings.check()?;
        if let Some(connector) = &self.connector {
            connector.connect(settings).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: SourceSettings> Configurator for SourcesConfigurator<T> {
    fn name(&self) -> &str {
        T::FAMILY
    }

    fn describe(&self) -> String {
        self.sources.describe()
    }

    fn location(&self) -> Option<Location> {
        match self.shape {
            Shape::Preloaded => None,
            Shape::Single | Shape::Multi => Some(Location::new(T::FILE)),
        }
    }

    fn decode(&mut self, payload: &Payload<'_>) -> Result<(), CodecError> {
        self.sources = match self.shape {
            Shape::Single => Sources::single(payload.decode::<T>()?),
            Shape::Multi | Shape::Preloaded => Sources::new(payload.decode::<SourceList<T>>()?.source),
        };
        Ok(())
    }

    fn requirement(&self) -> Requirement {
        self.requirement.unwrap_or(match self.shape {
            Shape::Single | Shape::Multi => Requirement::Optional,
            Shape::Preloaded => Requirement::Unconditional,
        })
    }

    async fn execute(&mut self) -> Result<(), BoxError> {
        if self.sources.is_empty() {
            if let Some(fallback) = T::fallback() {
                tracing::info!(family = T::FAMILY, "No sources configured, using the default one");
                self.sources = Sources::single(fallback);
            }
        }

        let Some(set) = SourceSet::from_sources(&self.sources) else {
            if self.shape == Shape::Single {
                tracing::info!(family = T::FAMILY, "Source disabled, not connected");
                return Ok(());
            }
            return Err(format!("no enabled {} source configured", T::FAMILY).into());
        };

        let mut ready = Vec::with_capacity(set.len());
        for settings in set.iter() {
            match self.connect(settings).await {
                Ok(()) => {
                    tracing::info!(
                        family = T::FAMILY,
                        source = %settings.source(),
                        settings = %settings.describe(),
                        "Source initialized"
                    );
                    ready.push(settings.clone());
                }
                Err(err) => tracing::error!(
                    family = T::FAMILY,
                    source = %settings.source(),
                    error = %err,
                    "Source failed to initialize"
                ),
            }
        }

        let Some(set) = SourceSet::from_sources(&Sources::new(ready)) else {
            return Err(format!("no {} source could be initialized", T::FAMILY).into());
        };
        tracing::info!(family = T::FAMILY, primary = %set.primary().source(), sources = set.len(), "Family ready");
        self.installed = Some(set);
        Ok(())
    }
}

impl<T: SourceSettings> fmt::Debug for SourcesConfigurator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourcesConfigurator")
            .field("family", &T::FAMILY)
            .field("shape", &self.shape)
            .field("sources", &self.sources)
            .finish()
    }
}
