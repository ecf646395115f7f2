//! Task use-case service and backend selection.
//!
//! # Responsibility
//! - Bind one storage backend at startup from the persisted flag.
//! - Expose the store contract unchanged to presentation callers.
//!
//! # Invariants
//! - The bound backend never changes for the lifetime of a service;
//!   switching requires reopening after the flag changes.
//! - Service APIs never bypass store validation/persistence contracts.

use crate::config::{ConfigError, StorageMode, StoreConfig, ZonePolicy};
use crate::model::task::{NewTask, Schedule, Task, TaskStatus};
use crate::repo::json_store::JsonTaskStore;
use crate::repo::sqlite_store::SqliteTaskStore;
use crate::repo::task_repo::{RepoError, RepoResult, TaskStore};
use chrono::{NaiveDate, NaiveDateTime};
use log::info;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors raised while binding the storage backend.
#[derive(Debug)]
pub enum OpenStoreError {
    Config(ConfigError),
    Store(RepoError),
}

impl Display for OpenStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OpenStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for OpenStoreError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<RepoError> for OpenStoreError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Opens the backend selected by the flag file of `config`.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn TaskStore>, OpenStoreError> {
    let mode = config.storage_mode()?;
    open_store_with_mode(config, mode)
}

/// Opens a specific backend, ignoring the flag file.
pub fn open_store_with_mode(
    config: &StoreConfig,
    mode: StorageMode,
) -> Result<Box<dyn TaskStore>, OpenStoreError> {
    config.check_data_dir()?;
    let store: Box<dyn TaskStore> = match mode {
        StorageMode::Json => Box::new(JsonTaskStore::open(config)?),
        StorageMode::Sqlite => Box::new(SqliteTaskStore::open(config)?),
    };
    info!(
        "event=storage_select module=service status=ok mode={} zone_policy={:?} data_dir={}",
        mode,
        store.zone_policy(),
        config.data_dir.display()
    );
    Ok(store)
}

/// Use-case facade over one task store.
pub struct TaskService<S: TaskStore> {
    store: S,
}

impl TaskService<Box<dyn TaskStore>> {
    /// Creates a service bound to the backend selected by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, OpenStoreError> {
        Ok(Self::new(open_store(config)?))
    }
}

impl<S: TaskStore> TaskService<S> {
    /// Wraps an already opened store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrows the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Gives the underlying store back.
    pub fn into_inner(self) -> S {
        self.store
    }

    /// Backend this service writes to.
    pub fn mode(&self) -> StorageMode {
        self.store.mode()
    }

    /// What `add_task` does with an unknown zone on this backend.
    pub fn zone_policy(&self) -> ZonePolicy {
        self.store.zone_policy()
    }

    /// Lists every task, zone by zone, in insertion order.
    pub fn get_all_tasks(&self) -> RepoResult<Vec<Task>> {
        self.store.get_all_tasks()
    }

    /// Lists one zone's tasks; empty for an unknown zone.
    pub fn get_tasks_by_zone(&self, zone: &str) -> RepoResult<Vec<Task>> {
        self.store.get_tasks_by_zone(zone)
    }

    /// Looks up one task by zone and title.
    pub fn get_task(&self, zone: &str, title: &str) -> RepoResult<Option<Task>> {
        self.store.get_task(zone, title)
    }

    /// Lists zone names in display order.
    pub fn get_zones(&self) -> RepoResult<Vec<String>> {
        self.store.get_zones()
    }

    /// Counts tasks per status, omitting statuses with no task.
    pub fn count_tasks_by_status(&self) -> RepoResult<BTreeMap<TaskStatus, usize>> {
        self.store.count_tasks_by_status()
    }

    /// Counts tasks per zone in display order, zero counts included.
    pub fn count_tasks_by_zone(&self) -> RepoResult<Vec<(String, usize)>> {
        self.store.count_tasks_by_zone()
    }

    /// Sets the status of one task.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when `(zone, title)` does not exist.
    pub fn update_task_status(
        &mut self,
        zone: &str,
        title: &str,
        status: TaskStatus,
    ) -> RepoResult<()> {
        self.store.update_task_status(zone, title, status)
    }

    /// Schedules one task from `start`.
    ///
    /// `duration` (work-days) replaces the stored estimate when given.
    /// Returns the stored schedule.
    pub fn schedule_task(
        &mut self,
        zone: &str,
        title: &str,
        start: NaiveDateTime,
        duration: Option<f64>,
    ) -> RepoResult<Schedule> {
        self.store.schedule_task(zone, title, start, duration)
    }

    /// Clears both dates of one task; the estimate is kept.
    pub fn unschedule_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        self.store.unschedule_task(zone, title)
    }

    /// Lists tasks that have both dates set.
    pub fn get_scheduled_tasks(&self) -> RepoResult<Vec<Task>> {
        self.store.get_scheduled_tasks()
    }

    /// Scheduled tasks covering `day`, e.g. today's work list.
    pub fn tasks_active_on(&self, day: NaiveDate) -> RepoResult<Vec<Task>> {
        self.store.tasks_active_on(day)
    }

    /// Adds an unscheduled task.
    ///
    /// # Errors
    /// - `RepoError::Conflict` when the zone already holds that title.
    /// - `RepoError::UnknownZone` under `ZonePolicy::Reject`.
    pub fn add_task(&mut self, task: &NewTask) -> RepoResult<()> {
        self.store.add_task(task)
    }

    /// Removes one task.
    pub fn delete_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        self.store.delete_task(zone, title)
    }

    /// Deletes every task and restores the seed zones.
    pub fn reset_to_empty(&mut self) -> RepoResult<()> {
        self.store.reset_to_empty()
    }
}
