//! Storage backends behind one task store contract.
//!
//! # Responsibility
//! - Define the backend-agnostic `TaskStore` contract.
//! - Provide the JSON-file and SQLite implementations.
//!
//! # Invariants
//! - Write paths validate input before touching storage.
//! - Expected outcomes (`NotFound`, `Conflict`, `UnknownZone`) are typed
//!   variants, separate from transport errors (`Db`, `Io`, `Json`).

pub mod json_store;
pub mod sqlite_store;
pub mod task_repo;
