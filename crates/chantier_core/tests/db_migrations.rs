use chantier_core::db::migrations::{latest_version, schema_version};
use chantier_core::db::{open_db, DbError};
use chantier_core::{RepoError, SqliteTaskStore, TaskStore, ZonePolicy};
use rusqlite::Connection;

#[test]
fn open_db_applies_all_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("tasks.db")).unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "zones");
    assert_table_exists(&conn, "taches");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "taches");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }

    let store_err = SqliteTaskStore::open_at(&path, vec![], ZonePolicy::Create)
        .err()
        .unwrap();
    assert!(matches!(
        store_err,
        RepoError::Db(DbError::UnsupportedSchemaVersion { .. })
    ));
}

#[test]
fn legacy_schema_without_version_is_adopted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE zones (id INTEGER PRIMARY KEY, nom TEXT UNIQUE);
         CREATE TABLE taches (
            id INTEGER PRIMARY KEY,
            zone_id INTEGER,
            titre TEXT,
            statut TEXT,
            priorite TEXT,
            duree_estimee REAL,
            date_debut TEXT,
            date_fin TEXT,
            FOREIGN KEY (zone_id) REFERENCES zones (id),
            UNIQUE (zone_id, titre)
         );
         INSERT INTO zones (nom) VALUES ('Palier');
         INSERT INTO taches (zone_id, titre, statut, priorite, duree_estimee, date_debut, date_fin)
         VALUES (1, 'Enduit', 'En cours', 'Basse', 1.5, '2024-03-01 00:00:00', '2024-03-02 12:00:00');",
    )
    .unwrap();
    drop(conn);

    let store =
        SqliteTaskStore::open_at(&path, vec!["Cuisine".to_string()], ZonePolicy::Create).unwrap();
    assert_eq!(store.get_zones().unwrap(), vec!["Palier"]);
    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());

    let task = store.get_task("Palier", "Enduit").unwrap().unwrap();
    assert_eq!(task.estimated_duration, 1.5);
    assert_eq!(
        task.scheduled_end().map(|end| end.to_string()),
        Some("2024-03-02 12:00:00".to_string())
    );
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
