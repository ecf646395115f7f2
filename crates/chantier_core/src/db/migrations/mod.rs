//! Schema versioning for the task database.
//!
//! # Responsibility
//! - Bring a fresh or legacy task database up to `latest_version()`.
//!
//! # Invariants
//! - Steps are listed in increasing `version` order and applied in one transaction.
//! - The applied version is stored in `PRAGMA user_version`.
//! - A database created before versioning (`user_version = 0` with existing
//!   `zones`/`taches` tables) keeps its rows; steps only use `IF NOT EXISTS`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "zones_and_tasks",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Reads `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Upgrades the schema behind `conn` to `latest_version()`.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    if from == latest {
        return Ok(());
    }

    if from == 0 && has_task_tables(conn)? {
        info!("event=db_migrate module=db status=legacy_schema_adopted");
    }

    let tx = conn.transaction()?;
    for step in SCHEMA_STEPS.iter().skip_while(|step| step.version <= from) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        info!(
            "event=db_migrate module=db status=applied version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;
    Ok(())
}

fn has_task_tables(conn: &Connection) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('zones', 'taches');",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 2)
}
