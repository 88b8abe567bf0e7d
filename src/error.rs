//! Engine-level error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::codec::CodecError;
use crate::config::loader::ConfigError;
use crate::configurator::Origin;
use crate::engine::Phase;
use crate::remote::RemoteError;

/// Error type used at every caller-supplied seam (custom functions, queue
/// tasks, configurator execution, collaborators).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Faults raised while bootstrapping.
///
/// Every variant is fatal to the enclosing phase; recoverable subsystem faults
/// never surface here, they are logged by the resolver instead.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A mutator or phase was entered after the server started.
    #[error("engine is already running")]
    AlreadyRunning,

    /// A phase was entered before its predecessor completed.
    #[error("phase `{phase}` requires `{expected}` but engine is at `{current}`")]
    PhaseOrder {
        phase: Phase,
        expected: Phase,
        current: Phase,
    },

    /// The main configuration file could not be read, written, or validated.
    #[error("configuration file {path:?} is unusable")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// A required configurator received settings it could not decode.
    #[error("configurator `{name}` could not decode settings from {origin}")]
    Decode {
        name: String,
        origin: Origin,
        #[source]
        source: CodecError,
    },

    /// A required configurator failed to execute.
    #[error("configurator `{name}` failed to execute (settings from {origin})")]
    Configurator {
        name: String,
        origin: Origin,
        #[source]
        source: BoxError,
    },

    /// The config center was needed but never connected.
    #[error("config center is not connected")]
    CenterUnavailable,

    /// Settings requested through `load_remote_settings` could not be loaded.
    #[error("remote settings `{data_id}` could not be loaded")]
    RemoteSettings {
        data_id: String,
        #[source]
        source: BoxError,
    },

    /// Registering this instance with the naming service failed.
    #[error("failed to register instance `{instance}`")]
    Register {
        instance: String,
        #[source]
        source: RemoteError,
    },

    /// Table initialization for a data source failed.
    #[error("table initialization failed for source `{data_source}`")]
    Tables {
        data_source: String,
        #[source]
        source: BoxError,
    },

    /// A caller-registered custom function failed.
    #[error("custom function failed")]
    CustomFunc(#[source] BoxError),

    /// A caller-registered queue task failed.
    #[error("queue task `{task}` failed")]
    Task {
        task: String,
        #[source]
        source: BoxError,
    },

    /// The server failed to bind or stopped with an error.
    #[error("server failed")]
    Server(#[source] BoxError),

    /// The server panicked; the engine stayed parked until shutdown.
    #[error("server panicked: {0}")]
    ServerPanic(String),
}
