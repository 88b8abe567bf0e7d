//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, names)
//! - Detect duplicate source names inside a subsystem family
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the engine

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::configurator::{SourceSettings, Sources};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.name must not be empty")]
    EmptyServerName,
    #[error("server.port must be non-zero")]
    ZeroPort,
    #[error("server.prefix `{0}` must not contain whitespace")]
    InvalidPrefix(String),
    #[error("duplicate {family} source `{name}`")]
    DuplicateSource { family: &'static str, name: String },
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }
    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.server.prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::InvalidPrefix(config.server.prefix.clone()));
    }

    check_unique(config.database.as_ref(), &mut errors);
    check_unique(config.store.as_ref(), &mut errors);
    check_unique(config.cache.as_ref(), &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_unique<T: SourceSettings>(sources: Option<&Sources<T>>, errors: &mut Vec<ValidationError>) {
    let Some(sources) = sources else { return };
    let mut seen = HashSet::new();
    for settings in sources.iter() {
        if !seen.insert(settings.source()) {
            errors.push(ValidationError::DuplicateSource {
                family: T::FAMILY,
                name: settings.source().to_string(),
            });
        }
    }
}
