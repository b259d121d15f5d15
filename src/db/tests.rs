use super::{delete_meta, get_meta, open_connection, set_meta, CURRENT_SCHEMA_VERSION};
use crate::test_support::{cleanup_db_files, unique_db_path};
use rusqlite::params;

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path("daybook-pragmas");
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_tables_and_schema_version() {
    let path = unique_db_path("daybook-schema");
    let conn = open_connection(&path).expect("connection should open");

    for table in ["schema_migrations", "meta", "entries"] {
        assert!(table_exists(&conn, table), "expected table '{table}'");
    }
    let schema_version = get_meta(&conn, "schema_version")
        .expect("meta should be readable")
        .expect("schema version should be stored");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reopening_does_not_reapply_migrations() {
    let path = unique_db_path("daybook-reopen");
    drop(open_connection(&path).expect("first open should initialize schema"));

    let conn = open_connection(&path).expect("second open should be idempotent");
    let applied: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn meta_values_upsert_and_delete() {
    let path = unique_db_path("daybook-meta");
    let conn = open_connection(&path).expect("connection should open");

    set_meta(&conn, "session_user", "ada").expect("meta write should succeed");
    set_meta(&conn, "session_user", "grace").expect("meta overwrite should succeed");
    assert_eq!(
        get_meta(&conn, "session_user").expect("meta read"),
        Some("grace".to_string())
    );
    delete_meta(&conn, "session_user").expect("meta delete should succeed");
    assert_eq!(get_meta(&conn, "session_user").expect("meta read"), None);

    cleanup_db_files(&path);
}
