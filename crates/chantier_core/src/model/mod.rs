//! Domain model for zones and renovation tasks.
//!
//! # Responsibility
//! - Define canonical data structures used by both storage backends.
//!
//! # Invariants
//! - Zones are plain names; every task belongs to exactly one zone.
//! - Scheduled dates are only reachable through `Schedule`.

pub mod task;
