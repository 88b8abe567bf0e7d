//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bootstrap_phase_duration_seconds` (histogram): phase latency by phase, outcome
//! - `bootstrap_configurator_total` (counter): configurator runs by name, origin, outcome
//! - `bootstrap_task_total` (counter): queue task runs by task, outcome
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder it is a no-op
//! - The Prometheus exporter only starts when `server.metrics_address` is set

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::configurator::Origin;
use crate::engine::Phase;
use crate::error::BoxError;

/// Start the Prometheus scrape endpoint and install the global recorder.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BoxError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_phase(phase: Phase, started: Instant, ok: bool) {
    histogram!(
        "bootstrap_phase_duration_seconds",
        "phase" => phase.to_string(),
        "outcome" => outcome(ok)
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_configurator(name: &str, origin: &Origin, outcome: &'static str) {
    counter!(
        "bootstrap_configurator_total",
        "configurator" => name.to_string(),
        "origin" => origin.kind(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_task(task: &str, ok: bool) {
    counter!(
        "bootstrap_task_total",
        "task" => task.to_string(),
        "outcome" => outcome(ok)
    )
    .increment(1);
}
