//! One-shot JSON -> SQLite migration.
//!
//! # Responsibility
//! - Copy every zone and task of the JSON file into the SQLite store.
//! - Back up the JSON file and flip the storage flag on success.
//!
//! # Invariants
//! - The transfer is one SQLite transaction: a failed migration leaves the
//!   relational store as it was.
//! - The flag is written last; any failure leaves JSON authoritative.
//! - The JSON file is copied, never moved or modified.

use crate::config::{write_storage_mode, ConfigError, StorageMode, StoreConfig};
use crate::repo::json_store::ZoneBook;
use crate::repo::sqlite_store::{ImportSummary, SqliteTaskStore};
use crate::repo::task_repo::RepoError;
use chrono::Utc;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Outcome of a successful migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub zones: usize,
    pub tasks: usize,
    pub scheduled: usize,
    pub backup_path: PathBuf,
}

#[derive(Debug)]
pub enum MigrationError {
    /// The flag already selects SQLite.
    AlreadyMigrated,
    /// The JSON file does not exist.
    SourceMissing(PathBuf),
    /// The JSON file could not be read or parsed.
    Source(RepoError),
    /// The SQLite store could not be opened or written.
    Target(RepoError),
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    Config(ConfigError),
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyMigrated => write!(f, "migration already done: storage mode is sqlite"),
            Self::SourceMissing(path) => {
                write!(f, "task file `{}` not found", path.display())
            }
            Self::Source(err) => write!(f, "cannot read task file: {err}"),
            Self::Target(err) => write!(f, "cannot write task database: {err}"),
            Self::Backup { path, source } => {
                write!(f, "cannot write backup `{}`: {source}", path.display())
            }
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MigrationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Source(err) | Self::Target(err) => Some(err),
            Self::Backup { source, .. } => Some(source),
            Self::Config(err) => Some(err),
            Self::AlreadyMigrated | Self::SourceMissing(_) => None,
        }
    }
}

impl From<ConfigError> for MigrationError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

/// Migrates the JSON store of `config` into its SQLite store.
///
/// # Side effects
/// - Replaces all SQLite content with the JSON content.
/// - Writes `<json file>.bak.<unix seconds>` next to the JSON file.
/// - Sets the flag to `use_sqlite=True`.
/// - Emits `migration` logging events.
pub fn migrate_from_json(config: &StoreConfig) -> Result<MigrationReport, MigrationError> {
    config.check_data_dir()?;
    if config.storage_mode()? == StorageMode::Sqlite {
        return Err(MigrationError::AlreadyMigrated);
    }

    let started_at = Instant::now();
    let source_path = config.json_path();
    info!(
        "event=migration module=service status=start source={} target={}",
        source_path.display(),
        config.db_path().display()
    );

    let result = run_migration(config, &source_path);
    match &result {
        Ok(report) => info!(
            "event=migration module=service status=ok duration_ms={} zones={} tasks={} scheduled={} backup={}",
            started_at.elapsed().as_millis(),
            report.zones,
            report.tasks,
            report.scheduled,
            report.backup_path.display()
        ),
        Err(err) => error!(
            "event=migration module=service status=error duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

/// Copies the content of one JSON task file into `target`.
///
/// Does not touch the flag file or create a backup.
pub fn transfer_json_file(
    source_path: &Path,
    target: &mut SqliteTaskStore,
) -> Result<ImportSummary, MigrationError> {
    let book = match ZoneBook::read_from(source_path) {
        Ok(book) => book,
        Err(RepoError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(MigrationError::SourceMissing(source_path.to_path_buf()))
        }
        Err(err) => return Err(MigrationError::Source(err)),
    };
    target
        .import_zones(book.zones())
        .map_err(MigrationError::Target)
}

/// Writes the storage flag, e.g. to go back to JSON after a migration.
///
/// Data is not copied between backends.
pub fn set_storage_mode(config: &StoreConfig, mode: StorageMode) -> Result<(), MigrationError> {
    write_storage_mode(config.flag_path(), mode)?;
    info!(
        "event=storage_mode_set module=service status=ok mode={}",
        mode
    );
    Ok(())
}

/// Backup location for `source` taken at `unix_seconds`.
pub fn backup_path_for(source: &Path, unix_seconds: i64) -> PathBuf {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{file_name}.bak.{unix_seconds}"))
}

fn run_migration(
    config: &StoreConfig,
    source_path: &Path,
) -> Result<MigrationReport, MigrationError> {
    if !source_path.exists() {
        return Err(MigrationError::SourceMissing(source_path.to_path_buf()));
    }

    let mut target = SqliteTaskStore::open(config).map_err(MigrationError::Target)?;
    let summary = transfer_json_file(source_path, &mut target)?;

    let backup_path = backup_path_for(source_path, Utc::now().timestamp());
    fs::copy(source_path, &backup_path).map_err(|source| MigrationError::Backup {
        path: backup_path.clone(),
        source,
    })?;

    write_storage_mode(config.flag_path(), StorageMode::Sqlite)?;

    Ok(MigrationReport {
        zones: summary.zones,
        tasks: summary.tasks,
        scheduled: summary.scheduled,
        backup_path,
    })
}
