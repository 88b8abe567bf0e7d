//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::codec::{CodecError, Format};
use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] CodecError),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decode any settings file, picking the codec from its extension.
pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = Format::from_path(path)?;
    let content = fs::read_to_string(path)?;
    Ok(format.decode(&content)?)
}

/// Encode a value into a settings file, creating parent directories.
pub fn write_file<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let format = Format::from_path(path)?;
    let content = format.encode(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Load and validate the main configuration file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the main configuration, writing `defaults` first when the file is missing.
///
/// Returns the configuration and whether the file was created.
pub fn load_or_init(path: &Path, defaults: &AppConfig) -> Result<(AppConfig, bool), ConfigError> {
    if path.exists() {
        return Ok((load_config(path)?, false));
    }
    write_file(path, defaults)?;
    tracing::info!(path = %path.display(), "Wrote default configuration file");
    Ok((defaults.clone(), true))
}
