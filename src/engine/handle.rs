//! Cloneable view of an engine that outlives borrows of it.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::lifecycle::Shutdown;
use crate::remote::{ConfigCenter, ContentCache};
use crate::subsystem::Subsystems;

/// Handles published by the engine as phases complete.
///
/// Reading them never locks the engine, so they stay reachable while
/// `run()` is serving.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) shutdown: Shutdown,
    pub(crate) cache: ContentCache,
    pub(crate) subsystems: watch::Receiver<Subsystems>,
}

impl EngineHandle {
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn content_cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Subsystems as of the last completed phase.
    pub fn subsystems(&self) -> Subsystems {
        self.subsystems.borrow().clone()
    }

    /// The connected config center, for deregistration hooks.
    pub fn center(&self) -> Option<Arc<dyn ConfigCenter>> {
        self.subsystems.borrow().center.clone()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("shutdown", &self.shutdown.is_triggered())
            .field("subsystems", &*self.subsystems.borrow())
            .finish()
    }
}
