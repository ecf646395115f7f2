//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open the task database once at startup and bring its schema up to date.
//! - Hand out short-lived, configured connections for individual store calls.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - `open_db` returns only after migrations are fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{debug, error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the task database file and applies all pending migrations.
///
/// # Side effects
/// - Creates the database file when missing.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start path={}",
        path.display()
    );

    let result = connect(path).and_then(|mut conn| {
        apply_migrations(&mut conn)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Opens a configured connection without running migrations.
///
/// Used for per-call connections once `open_db` has succeeded for the path.
pub fn connect(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    debug!("event=db_connect module=db status=ok path={}", path.display());
    Ok(conn)
}
