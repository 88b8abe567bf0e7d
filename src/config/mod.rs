//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config.toml (written with defaults on first run)
//!     → loader.rs (codec by extension, deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (owned by the engine)
//!
//! Per-family files (log.toml, database.toml, ...):
//!     → codec.rs (TOML / JSON)
//!     → decoded by the configurator resolver
//!     → watcher.rs pushes later edits into the content cache
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A family configured inside config.toml is used as-is

pub mod codec;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use codec::{CodecError, Format};
pub use loader::ConfigError;
pub use schema::{AppConfig, ServerConfig, CONFIG_FILE, DEFAULT_CONFIG_DIR};
