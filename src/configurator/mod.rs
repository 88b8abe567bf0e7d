//! Configurators: named units that locate settings and initialize one subsystem.
//!
//! # Responsibilities
//! - Describe where a subsystem's settings live (`Location`)
//! - Decode settings from whichever origin resolved them
//! - Run the subsystem initialization once settings are in place
//!
//! # Data Flow
//! ```text
//! Resolver::resolve(&mut dyn Configurator)
//!     1. remote  (group, data_id)   if a config center is attached
//!     2. local   <config_dir>/file  on remote miss or failure
//!     3. default                    built-in settings
//!     → decode(payload) → execute() → Resolution
//! ```
//!
//! # Design Decisions
//! - Whether a configurator runs without found settings is an explicit
//!   `Requirement`, not inferred from its settings type
//! - Decoding is pure: a failed decode leaves the previous settings in place

pub mod resolver;
pub mod sources;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::codec::{CodecError, Format};
use crate::error::BoxError;

pub use resolver::{Resolution, Resolver};
pub use sources::{SourceList, SourceSet, SourceSettings, Sources, DEFAULT_SOURCE};

/// Where a configurator's settings can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File name relative to the config directory.
    pub file: PathBuf,
    /// Document id in the config center.
    pub data_id: String,
    /// Config center group; the service name when unset.
    pub group: Option<String>,
    /// Keep listening for content changes after resolution.
    pub listen: bool,
}

impl Location {
    /// Location whose local file name and data id are the same.
    pub fn new(file: &str) -> Self {
        Self {
            file: PathBuf::from(file),
            data_id: file.to_string(),
            group: None,
            listen: false,
        }
    }

    pub fn with_data_id(mut self, data_id: impl Into<String>) -> Self {
        self.data_id = data_id.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn listen(mut self, listen: bool) -> Self {
        self.listen = listen;
        self
    }
}

/// Whether a configurator runs when no settings were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Runs only when settings were found; a failure is logged.
    #[default]
    Optional,
    /// Always runs with found or default settings; a failure is logged.
    Unconditional,
    /// Always runs; any decode or execute failure aborts startup.
    Required,
}

impl Requirement {
    pub fn must_run(self) -> bool {
        !matches!(self, Requirement::Optional)
    }

    pub fn is_fatal(self) -> bool {
        matches!(self, Requirement::Required)
    }
}

/// Where the settings a configurator ran with came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Remote { group: String, data_id: String },
    Local(PathBuf),
    Default,
}

impl Origin {
    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Origin::Remote { .. } => "remote",
            Origin::Local(_) => "local",
            Origin::Default => "default",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Remote { group, data_id } => write!(f, "remote:{group}/{data_id}"),
            Origin::Local(path) => write!(f, "local:{}", path.display()),
            Origin::Default => f.write_str("default"),
        }
    }
}

/// Settings text plus the codec picked for it.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    pub format: Format,
    pub content: &'a str,
}

impl Payload<'_> {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        self.format.decode(self.content)
    }
}

/// A subsystem initializer driven by the engine.
#[async_trait]
pub trait Configurator: Send + Sync {
    /// Stable name used in logs and metrics.
    fn name(&self) -> &str;

    /// Human-readable rendering of the current settings (secrets masked).
    fn describe(&self) -> String;

    /// `None` means the settings are already in memory.
    fn location(&self) -> Option<Location>;

    fn decode(&mut self, payload: &Payload<'_>) -> Result<(), CodecError>;

    fn requirement(&self) -> Requirement {
        Requirement::Optional
    }

    async fn execute(&mut self) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_builder() {
        let location = Location::new("cache.toml")
            .with_data_id("orders-cache.json")
            .with_group("shared")
            .listen(true);
        assert_eq!(location.file, PathBuf::from("cache.toml"));
        assert_eq!(location.data_id, "orders-cache.json");
        assert_eq!(location.group.as_deref(), Some("shared"));
        assert!(location.listen);
    }

    #[test]
    fn test_requirement_semantics() {
        assert!(!Requirement::Optional.must_run());
        assert!(Requirement::Unconditional.must_run());
        assert!(!Requirement::Unconditional.is_fatal());
        assert!(Requirement::Required.is_fatal());
    }

    #[test]
    fn test_origin_display() {
        let remote = Origin::Remote {
            group: "orders".into(),
            data_id: "log.toml".into(),
        };
        assert_eq!(remote.to_string(), "remote:orders/log.toml");
        assert_eq!(Origin::Default.kind(), "default");
    }
}
