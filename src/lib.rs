//! Service Bootstrap Library
//!
//! Sequences configuration loading, subsystem initialization and server
//! startup for long-running network services.
//!
//! ```text
//!   caller registrations
//!          │
//!          ▼
//!   ┌─────────────┐   run()   ┌──────────────────────────────────────────────┐
//!   │   Engine    │──────────▶│ load_config → init_basic → run_configurators │
//!   │ (+ queue)   │           │ → run_custom_funcs → start_server            │
//!   └─────────────┘           └───────────────┬──────────────────────────────┘
//!                                             │ per subsystem
//!                                             ▼
//!                              Resolver: remote → local file → default
//! ```

// Core
pub mod configurator;
pub mod engine;
pub mod task;

// Subsystems and collaborators
pub mod config;
pub mod http;
pub mod remote;
pub mod subsystem;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use configurator::{Configurator, Location, Origin, Requirement};
pub use engine::{Anchor, Engine, EngineBuilder, EngineHandle, Phase, Switch};
pub use error::{BootstrapError, BoxError};
pub use lifecycle::Shutdown;
pub use task::{TaskList, TaskQueue};
