//! Structured logging.
//!
//! # Responsibilities
//! - Install the global tracing subscriber from `LogConfig`
//! - Route output to stdout or an appending log file
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - Installation is idempotent: a second call keeps the existing subscriber

use std::fs::{self, OpenOptions};
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::error::BoxError;
use crate::subsystem::{LogConfig, LogFormat};

/// Install the global subscriber. Returns `Ok(false)` if one was already set.
pub fn init(config: &LogConfig) -> Result<bool, BoxError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let (writer, ansi) = match config.file_path() {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), config.ansi),
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed(),
    };

    Ok(tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_ok())
}
