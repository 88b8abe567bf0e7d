//! Resilience helpers for calls to external collaborators.
//!
//! # Design Decisions
//! - Background loops (config polling, heartbeats) never give up; they back off
//! - Jittered backoff spreads retries from many instances

pub mod backoff;

pub use backoff::Backoff;
