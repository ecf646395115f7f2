//! Renovation task domain model.
//!
//! # Responsibility
//! - Define the status/priority vocabularies and their stored labels.
//! - Keep the scheduled date pair consistent with the estimated duration.
//!
//! # Invariants
//! - `(zone, title)` identifies a task across the whole store.
//! - A task is either scheduled (start and end) or unscheduled (neither).
//! - `Schedule::from_duration` is the only way an end date is derived, so
//!   every backend computes identical end dates for identical inputs.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One work-day is an 8-hour working day.
pub const HOURS_PER_WORK_DAY: f64 = 8.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;
const ISO_WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const ISO_READ_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Progress state of a task. Stored with its French label.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "À faire")]
    Todo,
    #[serde(rename = "En cours")]
    InProgress,
    #[serde(rename = "En attente")]
    Waiting,
    #[serde(rename = "Terminé")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Todo, Self::InProgress, Self::Waiting, Self::Done];

    /// Label persisted in both backends.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "À faire",
            Self::InProgress => "En cours",
            Self::Waiting => "En attente",
            Self::Done => "Terminé",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.label() == value)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Urgency of a task. Stored with its French label.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TaskPriority {
    #[serde(rename = "Élevée")]
    High,
    #[default]
    #[serde(rename = "Moyenne")]
    Medium,
    #[serde(rename = "Basse")]
    Low,
    #[serde(rename = "Faible")]
    Minor,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 4] = [Self::High, Self::Medium, Self::Low, Self::Minor];

    /// Label persisted in both backends.
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Élevée",
            Self::Medium => "Moyenne",
            Self::Low => "Basse",
            Self::Minor => "Faible",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|priority| priority.label() == value)
    }
}

impl Display for TaskPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Composite identity of a task: its zone plus its title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub zone: String,
    pub title: String,
}

impl TaskKey {
    pub fn new(zone: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            title: title.into(),
        }
    }
}

impl Display for TaskKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` in zone `{}`", self.title, self.zone)
    }
}

/// Validation failures for task write paths.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskValidationError {
    BlankZone,
    BlankTitle,
    /// Duration must be finite and strictly positive.
    InvalidDuration(f64),
    /// `start + duration` does not fit in the calendar range.
    ScheduleOutOfRange {
        start: NaiveDateTime,
        duration: f64,
    },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankZone => write!(f, "zone name must not be blank"),
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::InvalidDuration(value) => {
                write!(f, "estimated duration must be a positive number of days, got {value}")
            }
            Self::ScheduleOutOfRange { start, duration } => write!(
                f,
                "schedule starting {} with duration {duration} days is out of range",
                format_iso_datetime(*start)
            ),
        }
    }
}

impl Error for TaskValidationError {}

/// Scheduled date range of a task.
///
/// Start and end travel together; a task never holds one without the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Schedule {
    /// Builds a schedule ending `duration_days` calendar days after `start`.
    ///
    /// Fractional days are kept at millisecond precision.
    pub fn from_duration(
        start: NaiveDateTime,
        duration_days: f64,
    ) -> Result<Self, TaskValidationError> {
        validate_duration(duration_days)?;
        let out_of_range = || TaskValidationError::ScheduleOutOfRange {
            start,
            duration: duration_days,
        };
        let millis = (duration_days * MILLIS_PER_DAY).round() as i64;
        let offset = Duration::try_milliseconds(millis).ok_or_else(out_of_range)?;
        let end = start.checked_add_signed(offset).ok_or_else(out_of_range)?;
        Ok(Self { start, end })
    }

    /// Returns whether `day` falls within `[start.date(), end.date()]`.
    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start.date() <= day && day <= self.end.date()
    }
}

/// Canonical task record shared by both storage backends.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub zone: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Work-days; fractional values are partial days.
    pub estimated_duration: f64,
    pub schedule: Option<Schedule>,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.zone.as_str(), self.title.as_str())
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn scheduled_start(&self) -> Option<NaiveDateTime> {
        self.schedule.map(|schedule| schedule.start)
    }

    pub fn scheduled_end(&self) -> Option<NaiveDateTime> {
        self.schedule.map(|schedule| schedule.end)
    }

    /// Estimated duration expressed in working hours.
    pub fn estimated_hours(&self) -> f64 {
        work_days_to_hours(self.estimated_duration)
    }

    /// Validates invariants required before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_identity(&self.zone, &self.title)?;
        validate_duration(self.estimated_duration)
    }
}

/// Input for creating a task, carrying the historical defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub zone: String,
    pub title: String,
    pub priority: TaskPriority,
    pub estimated_duration: f64,
    pub status: TaskStatus,
}

impl NewTask {
    /// Creates an input with priority `Moyenne`, one work-day and status `À faire`.
    pub fn new(zone: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            title: title.into(),
            priority: TaskPriority::default(),
            estimated_duration: 1.0,
            status: TaskStatus::default(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_duration(mut self, estimated_duration: f64) -> Self {
        self.estimated_duration = estimated_duration;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.zone.as_str(), self.title.as_str())
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        validate_identity(&self.zone, &self.title)?;
        validate_duration(self.estimated_duration)
    }

    /// Converts into an unscheduled task.
    pub fn into_task(self) -> Task {
        Task {
            zone: self.zone,
            title: self.title,
            status: self.status,
            priority: self.priority,
            estimated_duration: self.estimated_duration,
            schedule: None,
        }
    }
}

pub fn work_days_to_hours(days: f64) -> f64 {
    days * HOURS_PER_WORK_DAY
}

/// Formats a date-time the way both backends persist it.
pub fn format_iso_datetime(value: NaiveDateTime) -> String {
    value.format(ISO_WRITE_FORMAT).to_string()
}

/// Parses ISO-8601 text, accepting `T` or space separators and bare dates.
pub fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    for format in ISO_READ_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn validate_identity(zone: &str, title: &str) -> Result<(), TaskValidationError> {
    if zone.trim().is_empty() {
        return Err(TaskValidationError::BlankZone);
    }
    if title.trim().is_empty() {
        return Err(TaskValidationError::BlankTitle);
    }
    Ok(())
}

fn validate_duration(value: f64) -> Result<(), TaskValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TaskValidationError::InvalidDuration(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    #[test]
    fn labels_serialize_in_french() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Done).unwrap(),
            r#""Terminé""#
        );
        assert_eq!(
            serde_json::to_string(&TaskPriority::High).unwrap(),
            r#""Élevée""#
        );
        let parsed: TaskStatus = serde_json::from_str(r#""En attente""#).unwrap();
        assert_eq!(parsed, TaskStatus::Waiting);
    }

    #[test]
    fn from_label_rejects_unknown_values() {
        assert_eq!(TaskStatus::from_label("En cours"), Some(TaskStatus::InProgress));
        assert_eq!(TaskStatus::from_label("done"), None);
        assert_eq!(TaskPriority::from_label("Faible"), Some(TaskPriority::Minor));
        assert_eq!(TaskPriority::from_label(""), None);
    }

    #[test]
    fn whole_days_move_end_by_calendar_days() {
        let schedule = Schedule::from_duration(midnight(2024, 3, 1), 3.0).unwrap();
        assert_eq!(schedule.end, midnight(2024, 3, 4));
    }

    #[test]
    fn fractional_days_move_end_inside_the_day() {
        let schedule = Schedule::from_duration(midnight(2024, 3, 1), 0.125).unwrap();
        assert_eq!(format_iso_datetime(schedule.end), "2024-03-01T03:00:00");
        assert!(schedule.contains_day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(!schedule.contains_day(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
    }

    #[test]
    fn schedule_rejects_non_positive_duration() {
        let err = Schedule::from_duration(midnight(2024, 3, 1), 0.0).unwrap_err();
        assert_eq!(err, TaskValidationError::InvalidDuration(0.0));
        assert!(Schedule::from_duration(midnight(2024, 3, 1), f64::NAN).is_err());
    }

    #[test]
    fn schedule_rejects_overflowing_end() {
        let err = Schedule::from_duration(NaiveDateTime::MAX, 1.0).unwrap_err();
        assert!(matches!(err, TaskValidationError::ScheduleOutOfRange { .. }));
    }

    #[test]
    fn parse_accepts_written_and_legacy_forms() {
        let expected = midnight(2024, 3, 1);
        assert_eq!(parse_iso_datetime("2024-03-01T00:00:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2024-03-01 00:00:00"), Some(expected));
        assert_eq!(parse_iso_datetime("2024-03-01"), Some(expected));
        assert_eq!(
            parse_iso_datetime("2024-03-01T03:00:00.500000"),
            expected.checked_add_signed(Duration::milliseconds(3 * 3_600_000 + 500))
        );
        assert_eq!(parse_iso_datetime("not a date"), None);
    }

    #[test]
    fn new_task_defaults_and_validation() {
        let input = NewTask::new("Cuisine", "Peindre");
        assert_eq!(input.priority, TaskPriority::Medium);
        assert_eq!(input.status, TaskStatus::Todo);
        assert_eq!(input.estimated_duration, 1.0);
        assert!(input.validate().is_ok());

        let blank = NewTask::new("Cuisine", "   ");
        assert_eq!(blank.validate(), Err(TaskValidationError::BlankTitle));
        let negative = NewTask::new("Cuisine", "Peindre").with_duration(-1.0);
        assert_eq!(
            negative.validate(),
            Err(TaskValidationError::InvalidDuration(-1.0))
        );
    }

    #[test]
    fn estimated_hours_uses_eight_hour_days() {
        let task = NewTask::new("Escalier", "Poncer")
            .with_duration(0.125)
            .into_task();
        assert_eq!(task.estimated_hours(), 1.0);
        assert!(!task.is_scheduled());
        assert_eq!(task.scheduled_start(), None);
    }
}
