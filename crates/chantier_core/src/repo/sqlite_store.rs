//! SQLite-backed task store.
//!
//! # Responsibility
//! - Provide the `TaskStore` contract over the `zones` / `taches` tables.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Schema is migrated and seed zones are inserted once, in `open_at`.
//! - Every call opens its own connection; mutations run in one transaction
//!   that is committed before returning or rolled back on error.
//! - A `(zone_id, titre)` constraint violation surfaces as `RepoError::Conflict`.
//! - Dates are stored as ISO-8601 text and parsed at read time.

use crate::config::{StorageMode, StoreConfig, ZonePolicy};
use crate::db::{connect, open_db};
use crate::model::task::{
    format_iso_datetime, parse_iso_datetime, NewTask, Schedule, Task, TaskKey, TaskPriority,
    TaskStatus,
};
use crate::repo::json_store::ZoneTasks;
use crate::repo::task_repo::{RepoError, RepoResult, TaskStore};
use chrono::NaiveDateTime;
use log::warn;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, ToSql};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TASK_SELECT_SQL: &str = "SELECT
    z.nom AS zone,
    t.titre,
    t.statut,
    t.priorite,
    t.duree_estimee,
    t.date_debut,
    t.date_fin
FROM taches t
JOIN zones z ON z.id = t.zone_id";

const TASK_ORDER_SQL: &str = "ORDER BY z.id ASC, t.id ASC";

/// Row counts written by `SqliteTaskStore::import_zones`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub zones: usize,
    pub tasks: usize,
    pub scheduled: usize,
}

/// SQLite task store bound to one database file.
pub struct SqliteTaskStore {
    path: PathBuf,
    default_zones: Vec<String>,
    zone_policy: ZonePolicy,
}

impl SqliteTaskStore {
    /// Opens the store described by `config`.
    pub fn open(config: &StoreConfig) -> RepoResult<Self> {
        Self::open_at(
            config.db_path(),
            config.default_zones.clone(),
            config.sqlite_zone_policy,
        )
    }

    /// Migrates the schema and seeds `default_zones` when `zones` is empty.
    ///
    /// # Errors
    /// - Any database failure here is fatal for the caller: the store is unusable.
    pub fn open_at(
        path: impl Into<PathBuf>,
        default_zones: Vec<String>,
        zone_policy: ZonePolicy,
    ) -> RepoResult<Self> {
        let path = path.into();
        let mut conn = open_db(&path)?;
        let tx = conn.transaction()?;
        let zone_count: i64 = tx.query_row("SELECT COUNT(*) FROM zones;", [], |row| row.get(0))?;
        if zone_count == 0 {
            for zone in &default_zones {
                ensure_zone(&tx, zone)?;
            }
        }
        tx.commit()?;

        Ok(Self {
            path,
            default_zones,
            zone_policy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the whole store with `zones` inside one transaction.
    ///
    /// Afterwards the zone list is exactly `zones`, in the given order, empty
    /// zones included. Scheduled tasks are rescheduled from their start with the
    /// stored duration. On error nothing is written.
    pub fn import_zones(&mut self, zones: &[ZoneTasks]) -> RepoResult<ImportSummary> {
        self.write(|conn| {
            clear_tables(conn)?;

            let mut summary = ImportSummary::default();
            for zone in zones {
                ensure_zone(conn, &zone.name)?;
                summary.zones += 1;

                for task in &zone.tasks {
                    let input = NewTask {
                        zone: zone.name.clone(),
                        title: task.title.clone(),
                        priority: task.priority,
                        estimated_duration: task.estimated_duration,
                        status: task.status,
                    };
                    insert_new_task(conn, ZonePolicy::Create, &input)?;
                    summary.tasks += 1;

                    if let Some(stored) = task.schedule {
                        let applied = schedule_existing(
                            conn,
                            &zone.name,
                            &task.title,
                            stored.start,
                            Some(task.estimated_duration),
                        )?;
                        if applied.end != stored.end {
                            warn!(
                                "event=import module=repo status=end_recomputed zone={} title={} stored_end={} end={}",
                                zone.name,
                                task.title,
                                format_iso_datetime(stored.end),
                                format_iso_datetime(applied.end)
                            );
                        }
                        summary.scheduled += 1;
                    }
                }
            }
            Ok(summary)
        })
    }

    fn read<T>(&self, op: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let conn = connect(&self.path)?;
        op(&conn)
    }

    fn write<T>(&self, op: impl FnOnce(&Connection) -> RepoResult<T>) -> RepoResult<T> {
        let mut conn = connect(&self.path)?;
        let tx = conn.transaction()?;
        let value = op(&*tx)?;
        tx.commit()?;
        Ok(value)
    }
}

impl TaskStore for SqliteTaskStore {
    fn mode(&self) -> StorageMode {
        StorageMode::Sqlite
    }

    fn zone_policy(&self) -> ZonePolicy {
        self.zone_policy
    }

    fn get_all_tasks(&self) -> RepoResult<Vec<Task>> {
        self.read(|conn| {
            query_tasks(
                conn,
                &format!("{TASK_SELECT_SQL} {TASK_ORDER_SQL}"),
                params![],
            )
        })
    }

    fn get_tasks_by_zone(&self, zone: &str) -> RepoResult<Vec<Task>> {
        self.read(|conn| {
            query_tasks(
                conn,
                &format!("{TASK_SELECT_SQL} WHERE z.nom = ?1 {TASK_ORDER_SQL}"),
                params![zone],
            )
        })
    }

    fn get_zones(&self) -> RepoResult<Vec<String>> {
        self.read(zone_names)
    }

    fn count_tasks_by_status(&self) -> RepoResult<BTreeMap<TaskStatus, usize>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT statut, COUNT(*) FROM taches GROUP BY statut;")?;
            let mut rows = stmt.query([])?;
            let mut counts = BTreeMap::new();
            while let Some(row) = rows.next()? {
                let label: String = row.get(0)?;
                let status = parse_status(&label)?;
                counts.insert(status, count_to_usize(row.get(1)?)?);
            }
            Ok(counts)
        })
    }

    fn count_tasks_by_zone(&self) -> RepoResult<Vec<(String, usize)>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT z.nom, COUNT(t.id)
                 FROM zones z
                 LEFT JOIN taches t ON t.zone_id = z.id
                 GROUP BY z.id
                 ORDER BY z.id ASC;",
            )?;
            let mut rows = stmt.query([])?;
            let mut counts = Vec::new();
            while let Some(row) = rows.next()? {
                counts.push((row.get::<_, String>(0)?, count_to_usize(row.get(1)?)?));
            }
            Ok(counts)
        })
    }

    fn update_task_status(
        &mut self,
        zone: &str,
        title: &str,
        status: TaskStatus,
    ) -> RepoResult<()> {
        self.write(|conn| {
            let changed = conn.execute(
                "UPDATE taches
                 SET statut = ?1
                 WHERE titre = ?2 AND zone_id = (SELECT id FROM zones WHERE nom = ?3);",
                params![status.label(), title, zone],
            )?;
            ensure_changed(changed, zone, title)
        })
    }

    fn schedule_task(
        &mut self,
        zone: &str,
        title: &str,
        start: NaiveDateTime,
        duration: Option<f64>,
    ) -> RepoResult<Schedule> {
        self.write(|conn| schedule_existing(conn, zone, title, start, duration))
    }

    fn unschedule_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        self.write(|conn| {
            let changed = conn.execute(
                "UPDATE taches
                 SET date_debut = NULL, date_fin = NULL
                 WHERE titre = ?1 AND zone_id = (SELECT id FROM zones WHERE nom = ?2);",
                params![title, zone],
            )?;
            ensure_changed(changed, zone, title)
        })
    }

    fn get_scheduled_tasks(&self) -> RepoResult<Vec<Task>> {
        self.read(|conn| {
            query_tasks(
                conn,
                &format!(
                    "{TASK_SELECT_SQL}
                     WHERE t.date_debut IS NOT NULL AND t.date_fin IS NOT NULL
                     {TASK_ORDER_SQL}"
                ),
                params![],
            )
        })
    }

    fn add_task(&mut self, task: &NewTask) -> RepoResult<()> {
        task.validate()?;
        let policy = self.zone_policy;
        self.write(|conn| insert_new_task(conn, policy, task))
    }

    fn delete_task(&mut self, zone: &str, title: &str) -> RepoResult<()> {
        self.write(|conn| {
            let changed = conn.execute(
                "DELETE FROM taches
                 WHERE titre = ?1 AND zone_id = (SELECT id FROM zones WHERE nom = ?2);",
                params![title, zone],
            )?;
            ensure_changed(changed, zone, title)
        })
    }

    fn reset_to_empty(&mut self) -> RepoResult<()> {
        self.write(|conn| reset_tables(conn, &self.default_zones))
    }
}

fn query_tasks(conn: &Connection, sql: &str, values: &[&dyn ToSql]) -> RepoResult<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(values)?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn zone_names(conn: &Connection) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT nom FROM zones ORDER BY id ASC;")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn zone_id(conn: &Connection, name: &str) -> RepoResult<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM zones WHERE nom = ?1;", [name], |row| row.get(0))
        .optional()?;
    Ok(id)
}

fn ensure_zone(conn: &Connection, name: &str) -> RepoResult<i64> {
    if let Some(id) = zone_id(conn, name)? {
        return Ok(id);
    }
    conn.execute("INSERT INTO zones (nom) VALUES (?1);", [name])?;
    Ok(conn.last_insert_rowid())
}

fn insert_new_task(conn: &Connection, policy: ZonePolicy, task: &NewTask) -> RepoResult<()> {
    task.validate()?;
    let zone_id = match zone_id(conn, &task.zone)? {
        Some(id) => id,
        None if policy == ZonePolicy::Create => ensure_zone(conn, &task.zone)?,
        None => return Err(RepoError::UnknownZone(task.zone.clone())),
    };

    let inserted = conn.execute(
        "INSERT INTO taches (zone_id, titre, statut, priorite, duree_estimee)
         VALUES (?1, ?2, ?3, ?4, ?5);",
        params![
            zone_id,
            task.title.as_str(),
            task.status.label(),
            task.priority.label(),
            task.estimated_duration,
        ],
    );
    match inserted {
        Ok(_) => Ok(()),
        Err(err) if is_constraint_violation(&err) => Err(RepoError::Conflict(task.key())),
        Err(err) => Err(err.into()),
    }
}

fn schedule_existing(
    conn: &Connection,
    zone: &str,
    title: &str,
    start: NaiveDateTime,
    duration: Option<f64>,
) -> RepoResult<Schedule> {
    let stored: Option<f64> = conn
        .query_row(
            "SELECT duree_estimee
             FROM taches
             WHERE titre = ?1 AND zone_id = (SELECT id FROM zones WHERE nom = ?2);",
            params![title, zone],
            |row| row.get(0),
        )
        .optional()?;
    let stored = stored.ok_or_else(|| RepoError::NotFound(TaskKey::new(zone, title)))?;

    let duration = duration.unwrap_or(stored);
    let schedule = Schedule::from_duration(start, duration)?;
    let changed = conn.execute(
        "UPDATE taches
         SET date_debut = ?1, date_fin = ?2, duree_estimee = ?3
         WHERE titre = ?4 AND zone_id = (SELECT id FROM zones WHERE nom = ?5);",
        params![
            format_iso_datetime(schedule.start),
            format_iso_datetime(schedule.end),
            duration,
            title,
            zone,
        ],
    )?;
    ensure_changed(changed, zone, title)?;
    Ok(schedule)
}

/// Deletes every task and brings the zone list back to exactly `default_zones`.
fn reset_tables(conn: &Connection, default_zones: &[String]) -> RepoResult<()> {
    clear_tables(conn)?;
    for name in default_zones {
        ensure_zone(conn, name)?;
    }
    Ok(())
}

fn clear_tables(conn: &Connection) -> RepoResult<()> {
    conn.execute_batch("DELETE FROM taches; DELETE FROM zones;")?;
    Ok(())
}

fn ensure_changed(changed: usize, zone: &str, title: &str) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(TaskKey::new(zone, title)));
    }
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

fn count_to_usize(value: i64) -> RepoResult<usize> {
    usize::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid row count `{value}`")))
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let zone: String = row.get("zone")?;
    let title: String = row.get("titre")?;

    let status_text: String = row.get("statut")?;
    let priority_text: String = row.get("priorite")?;
    let start = parse_optional_date(row.get("date_debut")?, "taches.date_debut")?;
    let end = parse_optional_date(row.get("date_fin")?, "taches.date_fin")?;

    let schedule = match (start, end) {
        (Some(start), Some(end)) => Some(Schedule { start, end }),
        (None, None) => None,
        _ => {
            warn!(
                "event=task_read module=repo status=half_schedule_dropped zone={} title={}",
                zone, title
            );
            None
        }
    };

    let task = Task {
        zone,
        title,
        status: parse_status(&status_text)?,
        priority: TaskPriority::from_label(&priority_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid task priority `{priority_text}` in taches.priorite"
            ))
        })?,
        estimated_duration: row.get("duree_estimee")?,
        schedule,
    };
    task.validate()?;
    Ok(task)
}

fn parse_status(value: &str) -> RepoResult<TaskStatus> {
    TaskStatus::from_label(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid task status `{value}` in taches.statut"))
    })
}

fn parse_optional_date(value: Option<String>, column: &str) -> RepoResult<Option<NaiveDateTime>> {
    value
        .map(|text| {
            parse_iso_datetime(&text).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid ISO-8601 date `{text}` in {column}"))
            })
        })
        .transpose()
}
