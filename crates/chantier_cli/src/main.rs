//! Operator entry point for the renovation task store.
//!
//! # Responsibility
//! - Inspect the active backend and its data.
//! - Trigger the JSON -> SQLite migration, switch the storage flag, reset data.

use chantier_core::{
    default_log_level, init_logging, migrate_from_json, set_storage_mode, MigrationError,
    StorageMode, StoreConfig, Task, TaskService,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "chantier", version, about = "Renovation task store operations")]
struct Cli {
    /// Directory holding tasks_data.json, tasks.db and .db_config.
    #[arg(long, env = "CHANTIER_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "CHANTIER_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "CHANTIER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the active backend, zones and task counts.
    Status,
    /// List tasks.
    List {
        #[arg(long)]
        zone: Option<String>,
        /// Only tasks with a schedule.
        #[arg(long)]
        scheduled: bool,
    },
    /// List tasks planned on a day (defaults to today).
    Today {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Copy the JSON store into SQLite and switch to SQLite.
    Migrate,
    /// Write the storage flag without copying data.
    Mode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    /// Delete every task and restore the seed zones.
    Reset {
        /// Required confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Json,
    Sqlite,
}

impl From<ModeArg> for StorageMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Json => StorageMode::Json,
            ModeArg::Sqlite => StorageMode::Sqlite,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(message) = init_logging(level, &log_dir.to_string_lossy()) {
            eprintln!("logging disabled: {message}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::new(cli.data_dir);

    match cli.command {
        Command::Status => {
            let service = TaskService::open(&config)?;
            println!("mode: {}", service.mode());
            println!("zone policy: {:?}", service.zone_policy());
            for (zone, count) in service.count_tasks_by_zone()? {
                println!("zone {zone}: {count}");
            }
            for (status, count) in service.count_tasks_by_status()? {
                println!("status {status}: {count}");
            }
        }
        Command::List { zone, scheduled } => {
            let service = TaskService::open(&config)?;
            let tasks = match (zone, scheduled) {
                (Some(zone), false) => service.get_tasks_by_zone(&zone)?,
                (Some(zone), true) => service
                    .get_tasks_by_zone(&zone)?
                    .into_iter()
                    .filter(Task::is_scheduled)
                    .collect(),
                (None, false) => service.get_all_tasks()?,
                (None, true) => service.get_scheduled_tasks()?,
            };
            tasks.iter().for_each(print_task);
        }
        Command::Today { date } => {
            let service = TaskService::open(&config)?;
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            service.tasks_active_on(day)?.iter().for_each(print_task);
        }
        Command::Migrate => match migrate_from_json(&config) {
            Ok(report) => {
                println!(
                    "migrated {} tasks ({} scheduled) across {} zones",
                    report.tasks, report.scheduled, report.zones
                );
                println!("backup: {}", report.backup_path.display());
            }
            Err(MigrationError::AlreadyMigrated) => println!("already using sqlite"),
            Err(err) => return Err(err.into()),
        },
        Command::Mode { mode } => {
            set_storage_mode(&config, mode.into())?;
            println!("storage mode set to {}", StorageMode::from(mode));
        }
        Command::Reset { yes } => {
            if !yes {
                return Err("reset deletes every task; pass --yes to confirm".into());
            }
            let mut service = TaskService::open(&config)?;
            service.reset_to_empty()?;
            println!("store reset ({})", service.mode());
        }
    }
    Ok(())
}

fn print_task(task: &Task) {
    let schedule = match task.schedule {
        Some(schedule) => format!(" [{} -> {}]", schedule.start, schedule.end),
        None => String::new(),
    };
    println!(
        "{} | {} | {} | {} | {:.2} d ({:.1} h){}",
        task.zone,
        task.title,
        task.status,
        task.priority,
        task.estimated_duration,
        task.estimated_hours(),
        schedule
    );
}
