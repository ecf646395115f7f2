//! Core use-case services.
//!
//! # Responsibility
//! - Bind the configured storage backend for callers.
//! - Run the operator-triggered JSON -> SQLite migration.

pub mod migration_service;
pub mod task_service;
