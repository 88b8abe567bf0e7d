//! Named task scheduling.
//!
//! # Data Flow
//! ```text
//! registrant (engine phase, caller job)
//!     → TaskList::add_before / add_after (anchor-relative insert)
//!     → TaskQueue (single lock around structure and execution)
//!     → execute(): head → tail, evicting each task as it succeeds
//!     → first failure stops the walk, remainder stays queued
//! ```
//!
//! # Design Decisions
//! - Tasks live in an arena indexed by integer handles; no back-references
//! - Unknown anchors degrade to head/tail insertion instead of failing
//! - Actions receive a caller-chosen context so queues need no globals

pub mod queue;

pub use queue::{Action, TaskError, TaskList, TaskQueue, TaskResult};
