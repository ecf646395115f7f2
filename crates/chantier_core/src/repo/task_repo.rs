//! Task store contract shared by the JSON and SQLite backends.
//!
//! # Responsibility
//! - Define the backend-agnostic CRUD, scheduling and aggregation API.
//! - Map every expected outcome ("not found", "duplicate") to a typed error
//!   variant instead of a bare boolean.
//!
//! # Invariants
//! - Reads never fail because a zone or task is absent; they return empty data.
//! - Mutations take `&mut self`: one writer per store instance.
//! - Both backends produce identical results for identical call sequences,
//!   except where `ZonePolicy` says otherwise.

use crate::config::{StorageMode, ZonePolicy};
use crate::db::DbError;
use crate::model::task::{NewTask, Schedule, Task, TaskKey, TaskStatus, TaskValidationError};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// No task with this `(zone, title)`.
    NotFound(TaskKey),
    /// A task with this `(zone, title)` already exists.
    Conflict(TaskKey),
    /// Zone does not exist and the active policy refuses to create it.
    UnknownZone(String),
    Validation(TaskValidationError),
    Db(DbError),
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidData(String),
}

impl RepoError {
    /// Returns whether this is a caller-level outcome rather than a storage fault.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Conflict(_) | Self::UnknownZone(_) | Self::Validation(_)
        )
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(key) => write!(f, "task not found: {key}"),
            Self::Conflict(key) => write!(f, "task already exists: {key}"),
            Self::UnknownZone(zone) => write!(f, "unknown zone: `{zone}`"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "task file error: {err}"),
            Self::Json(err) => write!(f, "task file is not valid JSON: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::NotFound(_) | Self::Conflict(_) | Self::UnknownZone(_) | Self::InvalidData(_) => {
                None
            }
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Storage contract for zones and tasks.
pub trait TaskStore {
    /// Backend kind, for diagnostics and the ops CLI.
    fn mode(&self) -> StorageMode;

    /// Policy applied by `add_task` to unknown zones.
    fn zone_policy(&self) -> ZonePolicy;

    /// Every task, zone populated, in zone order then insertion order.
    fn get_all_tasks(&self) -> RepoResult<Vec<Task>>;

    /// Tasks of one zone; empty when the zone is unknown or has no tasks.
    fn get_tasks_by_zone(&self, zone: &str) -> RepoResult<Vec<Task>>;

    /// Zone names in stable display order.
    fn get_zones(&self) -> RepoResult<Vec<String>>;

    /// Number of tasks per status. Statuses without tasks are omitted.
    fn count_tasks_by_status(&self) -> RepoResult<BTreeMap<TaskStatus, usize>>;

    /// Number of tasks per zone, in `get_zones` order. Every known zone is
    /// present, possibly with 0.
    fn count_tasks_by_zone(&self) -> RepoResult<Vec<(String, usize)>>;

    fn update_task_status(&mut self, zone: &str, title: &str, status: TaskStatus)
        -> RepoResult<()>;

    /// Schedules a task from `start` for `duration` work-days.
    ///
    /// `duration = None` uses the stored estimate. `Some(d)` also replaces the
    /// stored estimate with `d`.
    fn schedule_task(
        &mut self,
        zone: &str,
        title: &str,
        start: NaiveDateTime,
        duration: Option<f64>,
    ) -> RepoResult<Schedule>;

    /// Clears both scheduled dates.
    fn unschedule_task(&mut self, zone: &str, title: &str) -> RepoResult<()>;

    /// Tasks carrying a schedule.
    fn get_scheduled_tasks(&self) -> RepoResult<Vec<Task>>;

    fn add_task(&mut self, task: &NewTask) -> RepoResult<()>;

    fn delete_task(&mut self, zone: &str, title: &str) -> RepoResult<()>;

    /// Removes every task and restores the seed zone list.
    fn reset_to_empty(&mut self) -> RepoResult<()>;

    /// Point lookup by composite key.
    fn get_task(&self, zone: &str, title: &str) -> RepoResult<Option<Task>> {
        Ok(self
            .get_tasks_by_zone(zone)?
            .into_iter()
            .find(|task| task.title == title))
    }

    /// Scheduled tasks whose date range covers `day`.
    fn tasks_active_on(&self, day: NaiveDate) -> RepoResult<Vec<Task>> {
        Ok(self
            .get_scheduled_tasks()?
            .into_iter()
            .filter(|task| task.schedule.is_some_and(|s| s.contains_day(day)))
            .collect())
    }
}

impl<S: TaskStore + ?Sized> TaskStore for Box<S> {
    fn mode(&self) -> StorageMode {
        (**self).mode()
    }

    fn zone_policy(&self) -> ZonePolicy {
        (**self).zone_policy()
    }

    fn get_all_tasks(&self) -> RepoResult<Vec<Task>> {
        (**self).get_all_tasks()
    }

    fn get_tasks_by_zone(&self, zone: &str) -> RepoResult<Vec<Task>> {
        (**self).get_tasks_by_zone(zone)
    }

    fn get_zones(&self) -> RepoResult<Vec<String>> {
        (**self).get_zones()
    }

    fn count_tasks_by_status(&self) -> RepoResult<BTreeMap<TaskStatus, usize>> {
        (**self).count_tasks_by_status()
    }

    fn count_tasks_by_zone(&self) -> RepoResult<Vec<(String, usize)>> {
        (**self).count_tasks_by_zone()
    }

    fn update_task_status(
        &mut self,
        zone: &str,
        title: &str,
        status: TaskStatus,
    ) -> RepoResult<()> {
        (**self).update_task_status(zone, title, status)
    }

    fn schedule_task(
        &mut self,
        zone: &str,
        title: &str,
        start: NaiveDateTime,
        duration: Option<f64>,
    ) -> RepoResult<Schedule> {
        (**self).schedule_task(zone, title, start, duration)
    }

    fn unschedule_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        (**self).unschedule_task(zone, title)
    }

    fn get_scheduled_tasks(&self) -> RepoResult<Vec<Task>> {
        (**self).get_scheduled_tasks()
    }

    fn add_task(&mut self, task: &NewTask) -> RepoResult<()> {
        (**self).add_task(task)
    }

    fn delete_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        (**self).delete_task(zone, title)
    }

    fn reset_to_empty(&mut self) -> RepoResult<()> {
        (**self).reset_to_empty()
    }

    fn get_task(&self, zone: &str, title: &str) -> RepoResult<Option<Task>> {
        (**self).get_task(zone, title)
    }

    fn tasks_active_on(&self, day: NaiveDate) -> RepoResult<Vec<Task>> {
        (**self).tasks_active_on(day)
    }
}
