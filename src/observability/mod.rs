//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine phases, configurators, queue tasks:
//!     → logging.rs (structured log events, stdout or file)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, file)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every HTTP request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
