//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Engine::shutdown() / signal → trigger → server drains → run() returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One shutdown coordinator per engine, shared with the HTTP server
//! - A panicked server keeps the process parked until shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
