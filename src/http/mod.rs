//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! Engine start_server phase
//!     → ServePlan (address, prefix, routes, middleware, shutdown)
//!     → Launcher::serve
//!         → server.rs (Axum router: nested routes → middleware → request id/timeout/trace)
//!         → graceful stop on Shutdown or SIGINT/SIGTERM
//! ```

pub mod server;

pub use server::{build_router, HttpServer, Launcher, MiddlewareFn, RouteFn, ServePlan};
