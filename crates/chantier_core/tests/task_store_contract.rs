use chantier_core::{
    JsonTaskStore, NewTask, RepoError, SqliteTaskStore, StorageMode, StoreConfig, TaskPriority,
    TaskStatus, TaskStore, ZoneBook, DEFAULT_ZONES,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;

fn both_stores(dir: &Path) -> Vec<Box<dyn TaskStore>> {
    let config = StoreConfig::new(dir);
    vec![
        Box::new(JsonTaskStore::open(&config).unwrap()),
        Box::new(SqliteTaskStore::open(&config).unwrap()),
    ]
}

fn midnight(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap()
}

fn carrelage() -> NewTask {
    NewTask::new("Cuisine", "Poser le carrelage")
        .with_priority(TaskPriority::High)
        .with_duration(2.0)
        .with_status(TaskStatus::Todo)
}

#[test]
fn fresh_store_has_seed_zones_in_order() {
    let dir = tempfile::tempdir().unwrap();
    for store in both_stores(dir.path()) {
        assert_eq!(store.get_zones().unwrap(), DEFAULT_ZONES.to_vec());
        assert!(store.get_all_tasks().unwrap().is_empty());
        assert!(store.count_tasks_by_status().unwrap().is_empty());

        let by_zone = store.count_tasks_by_zone().unwrap();
        let zones: Vec<&str> = by_zone.iter().map(|(zone, _)| zone.as_str()).collect();
        assert_eq!(zones, DEFAULT_ZONES.to_vec());
        assert!(by_zone.iter().all(|(_, count)| *count == 0));
    }
}

#[test]
fn kitchen_tiling_scenario() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        let mode = store.mode();
        store.add_task(&carrelage()).unwrap();

        let schedule = store
            .schedule_task("Cuisine", "Poser le carrelage", midnight(2024, 3, 1), Some(3.0))
            .unwrap();
        assert_eq!(schedule.end, midnight(2024, 3, 4), "{mode}");

        let tasks = store.get_tasks_by_zone("Cuisine").unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.zone, "Cuisine");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.estimated_duration, 3.0);
        assert_eq!(task.scheduled_start(), Some(midnight(2024, 3, 1)));
        assert_eq!(task.scheduled_end(), Some(midnight(2024, 3, 4)));

        store.unschedule_task("Cuisine", "Poser le carrelage").unwrap();
        let task = store
            .get_task("Cuisine", "Poser le carrelage")
            .unwrap()
            .unwrap();
        assert_eq!(task.scheduled_start(), None);
        assert_eq!(task.scheduled_end(), None);
        assert_eq!(task.estimated_duration, 3.0);

        store.delete_task("Cuisine", "Poser le carrelage").unwrap();
        assert!(store.get_tasks_by_zone("Cuisine").unwrap().is_empty());
        let err = store
            .delete_task("Cuisine", "Poser le carrelage")
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)), "{mode}: {err}");
    }
}

#[test]
fn duplicate_add_is_a_conflict_and_keeps_one_task() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        store.add_task(&carrelage()).unwrap();
        let err = store
            .add_task(&carrelage().with_duration(5.0))
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(ref key) if key.title == "Poser le carrelage"));
        assert!(err.is_expected());

        let tasks = store.get_tasks_by_zone("Cuisine").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].estimated_duration, 2.0);

        // Same title in another zone is a different task.
        store
            .add_task(&NewTask::new("Palier", "Poser le carrelage"))
            .unwrap();
        assert_eq!(store.get_all_tasks().unwrap().len(), 2);
    }
}

#[test]
fn schedule_without_override_uses_stored_duration() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        store
            .add_task(&NewTask::new("Escalier", "Vernir").with_duration(0.5))
            .unwrap();
        let schedule = store
            .schedule_task("Escalier", "Vernir", midnight(2024, 5, 10), None)
            .unwrap();
        assert_eq!(schedule.end, midnight(2024, 5, 10) + chrono::Duration::hours(12));

        let task = store.get_task("Escalier", "Vernir").unwrap().unwrap();
        assert_eq!(task.estimated_duration, 0.5);
        assert_eq!(task.schedule, Some(schedule));
    }
}

#[test]
fn missing_targets_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        let mode = store.mode();
        assert!(matches!(
            store.update_task_status("Cuisine", "Absent", TaskStatus::Done),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            store.schedule_task("Cuisine", "Absent", midnight(2024, 1, 1), Some(1.0)),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            store.unschedule_task("Nulle part", "Absent"),
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_task("Nulle part", "Absent"),
            Err(RepoError::NotFound(_))
        ));
        assert!(store.get_tasks_by_zone("Nulle part").unwrap().is_empty(), "{mode}");
        assert_eq!(store.get_task("Cuisine", "Absent").unwrap(), None);
    }
}

#[test]
fn invalid_input_is_rejected_before_storage() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        let err = store
            .add_task(&NewTask::new("Cuisine", "Peindre").with_duration(0.0))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));

        store.add_task(&NewTask::new("Cuisine", "Peindre")).unwrap();
        let err = store
            .schedule_task("Cuisine", "Peindre", midnight(2024, 1, 1), Some(-2.0))
            .unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
        let task = store.get_task("Cuisine", "Peindre").unwrap().unwrap();
        assert_eq!(task.estimated_duration, 1.0);
        assert_eq!(task.schedule, None);
    }
}

#[test]
fn status_updates_feed_status_counts() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        store.add_task(&NewTask::new("Palier", "Enduit")).unwrap();
        store.add_task(&NewTask::new("Palier", "Peinture")).unwrap();
        store
            .add_task(&NewTask::new("Escalier", "Poncer").with_status(TaskStatus::Waiting))
            .unwrap();
        store
            .update_task_status("Palier", "Enduit", TaskStatus::Done)
            .unwrap();

        let by_status = store.count_tasks_by_status().unwrap();
        assert_eq!(by_status.get(&TaskStatus::Done), Some(&1));
        assert_eq!(by_status.get(&TaskStatus::Todo), Some(&1));
        assert_eq!(by_status.get(&TaskStatus::Waiting), Some(&1));
        assert_eq!(by_status.get(&TaskStatus::InProgress), None);

        assert_eq!(
            store.count_tasks_by_zone().unwrap(),
            vec![
                ("Palier".to_string(), 2),
                ("Cuisine/Séjour".to_string(), 0),
                ("Escalier".to_string(), 1),
                ("Cuisine".to_string(), 0),
            ]
        );
    }
}

#[test]
fn scheduled_and_active_queries() {
    let dir = tempfile::tempdir().unwrap();
    for mut store in both_stores(dir.path()) {
        store.add_task(&NewTask::new("Palier", "Enduit")).unwrap();
        store
            .add_task(&NewTask::new("Cuisine", "Plomberie").with_duration(2.0))
            .unwrap();
        store.add_task(&NewTask::new("Escalier", "Poncer")).unwrap();
        store
            .schedule_task("Cuisine", "Plomberie", midnight(2024, 4, 1), None)
            .unwrap();
        store
            .schedule_task("Escalier", "Poncer", midnight(2024, 4, 5), None)
            .unwrap();

        let scheduled: Vec<String> = store
            .get_scheduled_tasks()
            .unwrap()
            .into_iter()
            .map(|task| task.title)
            .collect();
        assert_eq!(scheduled, vec!["Poncer", "Plomberie"]);

        let day = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let active = store.tasks_active_on(day).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "Plomberie");

        store.unschedule_task("Cuisine", "Plomberie").unwrap();
        assert!(store.tasks_active_on(day).unwrap().is_empty());
        assert_eq!(store.get_scheduled_tasks().unwrap().len(), 1);
    }
}

#[test]
fn reset_clears_tasks_and_restores_seed_zones() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path()).with_zone_policy(chantier_core::ZonePolicy::Create);
    let stores: Vec<Box<dyn TaskStore>> = vec![
        Box::new(JsonTaskStore::open(&config).unwrap()),
        Box::new(SqliteTaskStore::open(&config).unwrap()),
    ];
    for mut store in stores {
        store.add_task(&NewTask::new("Grenier", "Isoler")).unwrap();
        store.add_task(&carrelage()).unwrap();
        assert_eq!(store.get_zones().unwrap().len(), 5);

        store.reset_to_empty().unwrap();
        assert_eq!(store.get_zones().unwrap(), DEFAULT_ZONES.to_vec());
        assert!(store.get_all_tasks().unwrap().is_empty());
    }
}

#[test]
fn json_store_round_trips_through_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::new(dir.path());
    let expected = {
        let mut store = JsonTaskStore::open(&config).unwrap();
        store.add_task(&carrelage()).unwrap();
        store
            .add_task(&NewTask::new("Palier", "Enduit").with_duration(0.125))
            .unwrap();
        store
            .schedule_task("Palier", "Enduit", midnight(2024, 2, 29), None)
            .unwrap();
        assert_eq!(store.mode(), StorageMode::Json);
        store.snapshot().clone()
    };

    let reloaded = ZoneBook::read_from(&config.json_path()).unwrap();
    assert_eq!(reloaded, expected);

    let reopened = JsonTaskStore::open(&config).unwrap();
    let task = reopened.get_task("Palier", "Enduit").unwrap().unwrap();
    assert_eq!(
        task.scheduled_end().map(|end| end.date()),
        NaiveDate::from_ymd_opt(2024, 2, 29)
    );
}
