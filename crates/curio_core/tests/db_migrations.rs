use curio_core::db::migrations::{apply_migrations, latest_version, schema_version};
use curio_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1;",
        [name],
        |_| Ok(()),
    )
    .is_ok()
}

#[test]
fn in_memory_db_has_all_tables_and_latest_version() {
    let conn = open_db_in_memory().unwrap();

    for table in ["collections", "items", "notifications"] {
        assert!(table_exists(&conn, table), "missing table {table}");
    }
    assert_eq!(schema_version(&conn).unwrap(), latest_version());

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn pending_guard_index_exists() {
    let conn = open_db_in_memory().unwrap();
    let sql: String = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = 'idx_notifications_pending_unique';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(sql.contains("status = 'pending'"));
}

#[test]
fn reopening_file_db_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curio.sqlite3");

    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO collections (id, owner_id, name, description, metadata_schema, created_at, updated_at)
             VALUES ('c1', 'u1', 'Books', '', '{}', 0, 0);",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    let mut conn = conn;
    assert_eq!(apply_migrations(&mut conn).unwrap(), 0);
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM collections;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    }

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 99);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}
