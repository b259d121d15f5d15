use serde_json::json;

use super::{Offline, RemoteBoard, RemoteError, RemoteGateway, Session, SqliteRemote};
use crate::test_support::{cleanup_db_files, unique_db_path};

fn open_remote(path: &str, user: Option<&str>) -> SqliteRemote {
    SqliteRemote::open(path, user.map(Session::new)).expect("remote should open")
}

#[test]
fn operations_without_session_report_not_authenticated() {
    let path = unique_db_path("daybook-remote-anon");
    let remote = open_remote(&path, None);

    assert!(!remote.is_authenticated());
    let err = remote
        .set_goals("goals-2024-0-1", &[json!({"text": "x"})])
        .expect_err("anonymous writes should be refused");
    assert!(err.is_not_authenticated());
    assert!(matches!(
        remote.get_all_goals(),
        Err(RemoteError::NotAuthenticated)
    ));

    cleanup_db_files(&path);
}

#[test]
fn goals_replace_per_scope_and_group_in_snapshot() {
    let path = unique_db_path("daybook-remote-goals");
    let remote = open_remote(&path, Some("ada"));

    remote
        .set_goals(
            "goals-2024-0-1",
            &[json!({"text": "a", "done": false}), json!({"text": "b", "done": true})],
        )
        .expect("first write");
    remote
        .set_goals("goals-2024-0-1", &[json!({"text": "c", "done": false})])
        .expect("replacement");
    remote
        .set_goals("cal-2024-0-2", &[json!({"text": "dentist", "done": false})])
        .expect("calendar write");
    remote.set_goals("goals-2024-0-3", &[]).expect("empty write");

    let snapshot = remote.get_all_goals().expect("snapshot");
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["goals-2024-0-1"], vec![json!({"text": "c", "done": false})]);
    assert!(!snapshot.contains_key("goals-2024-0-3"));
    assert_eq!(
        remote.get_goals("cal-2024-0-2").expect("scoped read").len(),
        1
    );

    cleanup_db_files(&path);
}

#[test]
fn rows_are_partitioned_by_session_user() {
    let path = unique_db_path("daybook-remote-users");
    let ada = open_remote(&path, Some("ada"));
    ada.set_notes("notes-2024-0-1", "ada's notes").expect("write");
    ada.set_setting("habitChecks", &json!({"k": true}))
        .expect("setting write");

    let grace = open_remote(&path, Some("grace"));
    assert_eq!(grace.get_notes("notes-2024-0-1").expect("read"), None);
    assert_eq!(grace.get_setting("habitChecks").expect("read"), None);
    assert_eq!(
        ada.get_notes("notes-2024-0-1").expect("read").as_deref(),
        Some("ada's notes")
    );

    cleanup_db_files(&path);
}

#[test]
fn boards_round_trip_in_column_order() {
    let path = unique_db_path("daybook-remote-boards");
    let remote = open_remote(&path, Some("ada"));
    let mut board = RemoteBoard::new();
    board.insert("MO".to_string(), vec![json!("plan"), json!({"text": "ship"})]);
    board.insert("DI".to_string(), vec![json!({"text": "review"})]);

    remote.set_kanban("week-2024-W1", &board).expect("kanban write");
    remote.set_backlog(&board).expect("backlog write");

    assert_eq!(remote.get_kanban("week-2024-W1").expect("read"), board);
    assert!(remote.get_kanban("week-2024-W2").expect("read").is_empty());
    assert_eq!(remote.get_backlog().expect("read"), board);

    cleanup_db_files(&path);
}

#[test]
fn lists_upsert_by_name_and_delete() {
    let path = unique_db_path("daybook-remote-lists");
    let remote = open_remote(&path, Some("ada"));
    remote
        .set_list("Shopping", &[json!({"text": "eggs", "done": false})], "🛒")
        .expect("write");
    remote.set_list("Chores", &[], "📝").expect("write");
    remote
        .set_list("Shopping", &[json!({"text": "milk", "done": true})], "🛒")
        .expect("overwrite");

    let lists = remote.get_all_lists().expect("read all");
    assert_eq!(lists.len(), 2);
    assert_eq!(lists[0].name, "Shopping");
    assert_eq!(lists[0].items, vec![json!({"text": "milk", "done": true})]);

    remote.delete_list("Shopping").expect("delete");
    assert!(remote.get_list("Shopping").expect("read").is_none());
    assert_eq!(remote.get_all_lists().expect("read all").len(), 1);

    cleanup_db_files(&path);
}

#[test]
fn habits_replace_whole_sequence() {
    let path = unique_db_path("daybook-remote-habits");
    let remote = open_remote(&path, Some("ada"));
    remote
        .set_habits(&[json!({"name": "Run"}), json!({"name": "Read"})])
        .expect("write");
    remote.set_habits(&[json!({"name": "Swim"})]).expect("write");
    assert_eq!(
        remote.get_habits().expect("read"),
        vec![json!({"name": "Swim"})]
    );

    cleanup_db_files(&path);
}

#[test]
fn offline_gateway_refuses_everything() {
    let offline = Offline;
    assert!(offline.session().is_none());
    assert!(offline.get_habits().is_err());
    assert!(offline
        .set_setting("customListsMeta", &json!([]))
        .expect_err("offline")
        .is_not_authenticated());
}

#[test]
fn remote_error_display_and_source() {
    use std::error::Error;

    let db: RemoteError = rusqlite::Error::InvalidQuery.into();
    assert!(db.to_string().contains("remote database error"));
    assert!(db.source().is_some());

    let rejected = RemoteError::Rejected("quota".to_string());
    assert!(rejected.to_string().contains("quota"));
    assert!(rejected.source().is_none());
    assert!(RemoteError::NotAuthenticated
        .to_string()
        .contains("no active remote session"));
}
