//! Core task store for renovation planning.
//! This crate is the single source of truth for zone/task invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{
    read_storage_mode, write_storage_mode, ConfigError, StorageMode, StoreConfig, ZonePolicy,
    DEFAULT_ZONES,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{
    NewTask, Schedule, Task, TaskKey, TaskPriority, TaskStatus, TaskValidationError,
};
pub use repo::json_store::{JsonTaskStore, ZoneBook, ZoneTasks};
pub use repo::sqlite_store::{ImportSummary, SqliteTaskStore};
pub use repo::task_repo::{RepoError, RepoResult, TaskStore};
pub use service::migration_service::{
    migrate_from_json, set_storage_mode, transfer_json_file, MigrationError, MigrationReport,
};
pub use service::task_service::{open_store, open_store_with_mode, OpenStoreError, TaskService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
