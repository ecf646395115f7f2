//! File-backed task store.
//!
//! # Responsibility
//! - Hold the whole zone/task snapshot in memory.
//! - Persist the full snapshot to one JSON document after every mutation.
//!
//! # Invariants
//! - Zone order is the order of keys in the file.
//! - A mutation is applied to a copy of the snapshot; memory is only updated
//!   after the copy has been written, so memory and disk never diverge.
//! - An unreadable file is replaced by the seed structure and logged at
//!   `error` level (`event=json_load status=recovered`).
//!
//! # File layout
//! ```json
//! { "Cuisine": [ { "titre": "...", "statut": "À faire", "priorité": "Moyenne",
//!                  "durée_estimée": 1.0, "date_début": "2024-03-01T00:00:00",
//!                  "date_fin": "2024-03-02T00:00:00" } ] }
//! ```

use crate::config::{StorageMode, StoreConfig, ZonePolicy};
use crate::model::task::{
    format_iso_datetime, parse_iso_datetime, NewTask, Schedule, Task, TaskKey, TaskPriority,
    TaskStatus,
};
use crate::repo::task_repo::{RepoError, RepoResult, TaskStore};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::Formatter;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Tasks of one zone, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTasks {
    pub name: String,
    pub tasks: Vec<Task>,
}

/// Ordered zone -> tasks snapshot; the in-memory image of the JSON file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneBook {
    zones: Vec<ZoneTasks>,
}

impl ZoneBook {
    /// Creates a book with the given empty zones.
    pub fn with_zones<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut book = Self::default();
        for name in names {
            book.ensure_zone(name.into());
        }
        book
    }

    pub fn zones(&self) -> &[ZoneTasks] {
        &self.zones
    }

    pub fn zone_names(&self) -> Vec<String> {
        self.zones.iter().map(|zone| zone.name.clone()).collect()
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneTasks> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    /// All tasks in zone order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.zones.iter().flat_map(|zone| zone.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.zones.iter().map(|zone| zone.tasks.len()).sum()
    }

    /// Parses a JSON document.
    pub fn from_json_str(text: &str) -> RepoResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Renders the pretty-printed JSON document.
    pub fn to_json_string(&self) -> RepoResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads and parses a JSON file.
    pub fn read_from(path: &Path) -> RepoResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Writes the whole snapshot to a sibling temp file, then renames it over `path`.
    pub fn write_to(&self, path: &Path) -> RepoResult<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| {
                RepoError::InvalidData(format!("task file path `{}` has no file name", path.display()))
            })?
            .to_string_lossy()
            .into_owned();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = path.with_file_name(format!("{file_name}.tmp"));
        let text = self.to_json_string()?;
        fs::write(&staging, text)?;
        if let Err(err) = fs::rename(&staging, path) {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        Ok(())
    }

    fn ensure_zone(&mut self, name: String) -> &mut ZoneTasks {
        let index = match self.zones.iter().position(|zone| zone.name == name) {
            Some(index) => index,
            None => {
                self.zones.push(ZoneTasks {
                    name,
                    tasks: Vec::new(),
                });
                self.zones.len() - 1
            }
        };
        &mut self.zones[index]
    }

    fn zone_mut(&mut self, name: &str) -> Option<&mut ZoneTasks> {
        self.zones.iter_mut().find(|zone| zone.name == name)
    }

    fn task_mut(&mut self, zone: &str, title: &str) -> Option<&mut Task> {
        self.zone_mut(zone)?
            .tasks
            .iter_mut()
            .find(|task| task.title == title)
    }
}

/// On-disk shape of one task.
#[derive(Debug, Serialize, Deserialize)]
struct TaskRecord {
    #[serde(rename = "titre")]
    title: String,
    #[serde(rename = "statut")]
    status: TaskStatus,
    #[serde(rename = "priorité")]
    priority: TaskPriority,
    #[serde(rename = "durée_estimée")]
    estimated_duration: f64,
    #[serde(
        rename = "date_début",
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_datetime_opt"
    )]
    start: Option<NaiveDateTime>,
    #[serde(
        rename = "date_fin",
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_datetime_opt"
    )]
    end: Option<NaiveDateTime>,
}

impl TaskRecord {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            status: task.status,
            priority: task.priority,
            estimated_duration: task.estimated_duration,
            start: task.scheduled_start(),
            end: task.scheduled_end(),
        }
    }

    fn into_task(self, zone: &str) -> Task {
        let schedule = match (self.start, self.end) {
            (Some(start), Some(end)) => Some(Schedule { start, end }),
            (None, None) => None,
            _ => {
                warn!(
                    "event=json_load module=repo status=half_schedule_dropped zone={} title={}",
                    zone, self.title
                );
                None
            }
        };
        Task {
            zone: zone.to_string(),
            title: self.title,
            status: self.status,
            priority: self.priority,
            estimated_duration: self.estimated_duration,
            schedule,
        }
    }
}

mod iso_datetime_opt {
    use super::{format_iso_datetime, parse_iso_datetime};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&format_iso_datetime(*value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| {
                parse_iso_datetime(&text)
                    .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 date `{text}`")))
            })
            .transpose()
    }
}

impl Serialize for ZoneBook {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.zones.len()))?;
        for zone in &self.zones {
            let records: Vec<TaskRecord> = zone.tasks.iter().map(TaskRecord::from_task).collect();
            map.serialize_entry(&zone.name, &records)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ZoneBook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ZoneBookVisitor)
    }
}

struct ZoneBookVisitor;

impl<'de> Visitor<'de> for ZoneBookVisitor {
    type Value = ZoneBook;

    fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("a map of zone names to task lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut book = ZoneBook::default();
        while let Some((name, records)) = access.next_entry::<String, Vec<TaskRecord>>()? {
            if book.zone(&name).is_some() {
                return Err(de::Error::custom(format!("duplicate zone `{name}`")));
            }
            let mut tasks: Vec<Task> = Vec::with_capacity(records.len());
            for record in records {
                let task = record.into_task(&name);
                task.validate().map_err(de::Error::custom)?;
                if tasks.iter().any(|existing| existing.title == task.title) {
                    return Err(de::Error::custom(format!(
                        "duplicate task {}",
                        task.key()
                    )));
                }
                tasks.push(task);
            }
            book.zones.push(ZoneTasks { name, tasks });
        }
        Ok(book)
    }
}

/// JSON-file task store.
pub struct JsonTaskStore {
    path: PathBuf,
    default_zones: Vec<String>,
    zone_policy: ZonePolicy,
    book: ZoneBook,
}

impl JsonTaskStore {
    /// Opens the store described by `config`.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        Self::open_at(
            config.json_path(),
            config.default_zones.clone(),
            config.json_zone_policy,
        )
    }

    /// Loads `path`, or seeds it with `default_zones` when missing or unreadable.
    ///
    /// # Errors
    /// - Returns an error only when the seed structure cannot be written.
    pub fn open_at(
        path: impl Into<PathBuf>,
        default_zones: Vec<String>,
        zone_policy: ZonePolicy,
    ) -> RepoResult<Self> {
        let path = path.into();
        let book = match ZoneBook::read_from(&path) {
            Ok(book) => {
                info!(
                    "event=json_load module=repo status=ok path={} zones={} tasks={}",
                    path.display(),
                    book.zones.len(),
                    book.task_count()
                );
                book
            }
            Err(RepoError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                let book = ZoneBook::with_zones(default_zones.iter().cloned());
                book.write_to(&path)?;
                info!(
                    "event=json_load module=repo status=created path={}",
                    path.display()
                );
                book
            }
            Err(err) => {
                error!(
                    "event=json_load module=repo status=recovered path={} error={}",
                    path.display(),
                    err
                );
                let book = ZoneBook::with_zones(default_zones.iter().cloned());
                book.write_to(&path)?;
                book
            }
        };

        Ok(Self {
            path,
            default_zones,
            zone_policy,
            book,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory snapshot.
    pub fn snapshot(&self) -> &ZoneBook {
        &self.book
    }

    fn commit(&mut self, next: ZoneBook) -> RepoResult<()> {
        if let Err(err) = next.write_to(&self.path) {
            error!(
                "event=json_save module=repo status=error path={} error={}",
                self.path.display(),
                err
            );
            return Err(err);
        }
        self.book = next;
        Ok(())
    }

    fn edit_task<T>(
        &mut self,
        zone: &str,
        title: &str,
        edit: impl FnOnce(&mut Task) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let mut next = self.book.clone();
        let task = next
            .task_mut(zone, title)
            .ok_or_else(|| RepoError::NotFound(TaskKey::new(zone, title)))?;
        let value = edit(task)?;
        self.commit(next)?;
        Ok(value)
    }
}

impl TaskStore for JsonTaskStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Json
    }

    fn zone_policy(&self) -> ZonePolicy {
        self.zone_policy
    }

    fn get_all_tasks(&self) -> RepoResult<Vec<Task>> {
        Ok(self.book.tasks().cloned().collect())
    }

    fn get_tasks_by_zone(&self, zone: &str) -> RepoResult<Vec<Task>> {
        Ok(self
            .book
            .zone(zone)
            .map(|zone| zone.tasks.clone())
            .unwrap_or_default())
    }

    fn get_zones(&self) -> RepoResult<Vec<String>> {
        Ok(self.book.zone_names())
    }

    fn count_tasks_by_status(&self) -> RepoResult<BTreeMap<TaskStatus, usize>> {
        let mut counts = BTreeMap::new();
        for task in self.book.tasks() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn count_tasks_by_zone(&self) -> RepoResult<Vec<(String, usize)>> {
        Ok(self
            .book
            .zones
            .iter()
            .map(|zone| (zone.name.clone(), zone.tasks.len()))
            .collect())
    }

    fn update_task_status(
        &mut self,
        zone: &str,
        title: &str,
        status: TaskStatus,
    ) -> RepoResult<()> {
        self.edit_task(zone, title, |task| {
            task.status = status;
            Ok(())
        })
    }

    fn schedule_task(
        &mut self,
        zone: &str,
        title: &str,
        start: NaiveDateTime,
        duration: Option<f64>,
    ) -> RepoResult<Schedule> {
        self.edit_task(zone, title, |task| {
            let duration = duration.unwrap_or(task.estimated_duration);
            let schedule = Schedule::from_duration(start, duration)?;
            task.estimated_duration = duration;
            task.schedule = Some(schedule);
            Ok(schedule)
        })
    }

    fn unschedule_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        self.edit_task(zone, title, |task| {
            task.schedule = None;
            Ok(())
        })
    }

    fn get_scheduled_tasks(&self) -> RepoResult<Vec<Task>> {
        Ok(self
            .book
            .tasks()
            .filter(|task| task.is_scheduled())
            .cloned()
            .collect())
    }

    fn add_task(&mut self, task: &NewTask) -> RepoResult<()> {
        task.validate()?;

        if self.book.zone(&task.zone).is_none() && self.zone_policy == ZonePolicy::Reject {
            return Err(RepoError::UnknownZone(task.zone.clone()));
        }

        let mut next = self.book.clone();
        let zone = next.ensure_zone(task.zone.clone());
        if zone.tasks.iter().any(|existing| existing.title == task.title) {
            return Err(RepoError::Conflict(task.key()));
        }
        zone.tasks.push(task.clone().into_task());
        self.commit(next)
    }

    fn delete_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        let mut next = self.book.clone();
        let tasks = &mut next
            .zone_mut(zone)
            .ok_or_else(|| RepoError::NotFound(TaskKey::new(zone, title)))?
            .tasks;
        let index = tasks
            .iter()
            .position(|task| task.title == title)
            .ok_or_else(|| RepoError::NotFound(TaskKey::new(zone, title)))?;
        tasks.remove(index);
        self.commit(next)
    }

    fn reset_to_empty(&mut self) -> RepoResult<()> {
        let next = ZoneBook::with_zones(self.default_zones.iter().cloned());
        self.commit(next)
    }
}
