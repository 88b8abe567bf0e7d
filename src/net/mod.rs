//! Network helpers.
//!
//! # Design Decisions
//! - The advertised host is the address of the outbound interface, found by
//!   connecting a UDP socket (no packet is sent)
//! - Falls back to loopback when no route exists

pub mod identity;

pub use identity::{local_ip, resolve_host};
