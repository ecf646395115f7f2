//! Store configuration and the persisted storage-mode flag.
//!
//! # Responsibility
//! - Describe where the JSON file, SQLite file and flag file live.
//! - Read and write the single-line `use_sqlite=True|False` flag.
//!
//! # Invariants
//! - A missing flag file means JSON mode.
//! - The seed zone list is configuration, never hardcoded in store logic.

use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Zones created on first run, in display order.
pub const DEFAULT_ZONES: [&str; 4] = ["Palier", "Cuisine/Séjour", "Escalier", "Cuisine"];

pub const DEFAULT_JSON_FILE_NAME: &str = "tasks_data.json";
pub const DEFAULT_DB_FILE_NAME: &str = "tasks.db";
pub const DEFAULT_FLAG_FILE_NAME: &str = ".db_config";

const SQLITE_FLAG_LINE: &str = "use_sqlite=True";
const JSON_FLAG_LINE: &str = "use_sqlite=False";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    /// The data directory is missing or is not a directory.
    InvalidDataDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "config file `{}`: {source}", path.display())
            }
            Self::InvalidDataDir(path) => {
                write!(f, "data directory `{}` is not a directory", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidDataDir(_) => None,
        }
    }
}

/// Active persistence backend for the process lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    #[default]
    Json,
    Sqlite,
}

impl StorageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

impl Display for StorageMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `add_task` does when the target zone does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZonePolicy {
    /// Refuse the task with `RepoError::UnknownZone`.
    Reject,
    /// Append the zone and insert the task.
    Create,
}

/// Locations and policies shared by both backends.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub json_file_name: String,
    pub db_file_name: String,
    pub flag_file_name: String,
    pub default_zones: Vec<String>,
    pub json_zone_policy: ZonePolicy,
    pub sqlite_zone_policy: ZonePolicy,
}

impl StoreConfig {
    /// Creates a config rooted at `data_dir` with the historical defaults.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            json_file_name: DEFAULT_JSON_FILE_NAME.to_string(),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            flag_file_name: DEFAULT_FLAG_FILE_NAME.to_string(),
            default_zones: DEFAULT_ZONES.iter().map(|zone| zone.to_string()).collect(),
            json_zone_policy: ZonePolicy::Reject,
            sqlite_zone_policy: ZonePolicy::Create,
        }
    }

    pub fn with_default_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_zones = zones.into_iter().map(Into::into).collect();
        self
    }

    /// Applies one zone policy to both backends.
    pub fn with_zone_policy(mut self, policy: ZonePolicy) -> Self {
        self.json_zone_policy = policy;
        self.sqlite_zone_policy = policy;
        self
    }

    pub fn json_path(&self) -> PathBuf {
        self.data_dir.join(&self.json_file_name)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file_name)
    }

    pub fn flag_path(&self) -> PathBuf {
        self.data_dir.join(&self.flag_file_name)
    }

    /// Fails unless `data_dir` is an existing directory.
    pub fn check_data_dir(&self) -> ConfigResult<()> {
        if self.data_dir.is_dir() {
            Ok(())
        } else {
            Err(ConfigError::InvalidDataDir(self.data_dir.clone()))
        }
    }

    /// Reads the storage mode from this config's flag file.
    pub fn storage_mode(&self) -> ConfigResult<StorageMode> {
        read_storage_mode(self.flag_path())
    }
}

/// Reads the persisted storage-mode flag.
///
/// Missing file -> `Json`. Any content mentioning `use_sqlite=True` -> `Sqlite`.
pub fn read_storage_mode(path: impl AsRef<Path>) -> ConfigResult<StorageMode> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(StorageMode::Json),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.contains(SQLITE_FLAG_LINE) {
        return Ok(StorageMode::Sqlite);
    }
    if content.trim() != JSON_FLAG_LINE {
        warn!(
            "event=storage_flag_read module=config status=unrecognized path={} fallback=json",
            path.display()
        );
    }
    Ok(StorageMode::Json)
}

/// Overwrites the storage-mode flag file.
pub fn write_storage_mode(path: impl AsRef<Path>, mode: StorageMode) -> ConfigResult<()> {
    let path = path.as_ref();
    let line = match mode {
        StorageMode::Json => JSON_FLAG_LINE,
        StorageMode::Sqlite => SQLITE_FLAG_LINE,
    };
    fs::write(path, format!("{line}\n")).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
