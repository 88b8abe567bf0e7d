//! Settings codecs, picked by file extension or data-id suffix.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Structured text formats understood by the loader and the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

/// Decode or encode failure.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported settings format for `{0}`")]
    Unsupported(String),
    #[error("invalid TOML: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("cannot encode TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Format {
    /// Pick a codec from a file name or data id such as `database.toml`.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        Self::from_path(Path::new(name))
    }

    pub fn from_path(path: &Path) -> Result<Self, CodecError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("toml") => Ok(Format::Toml),
            Some("json") => Ok(Format::Json),
            _ => Err(CodecError::Unsupported(path.display().to_string())),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, content: &str) -> Result<T, CodecError> {
        match self {
            Format::Toml => Ok(toml::from_str(content)?),
            Format::Json => Ok(serde_json::from_str(content)?),
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<String, CodecError> {
        match self {
            Format::Toml => Ok(toml::to_string_pretty(value)?),
            Format::Json => Ok(serde_json::to_string_pretty(value)?),
        }
    }
}
