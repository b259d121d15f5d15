use std::cell::Cell;
use std::rc::Rc;

use super::{LocalStore, Origin};
use crate::model::ListItem;
use crate::test_support::{cleanup_db_files, unique_db_path};

fn open_store(prefix: &str) -> (LocalStore, String) {
    let path = unique_db_path(prefix);
    let store = LocalStore::open(&path).expect("store should open");
    (store, path)
}

#[test]
fn local_set_marks_dirty_and_reads_back() {
    let (store, path) = open_store("daybook-store-local");
    let items = vec![ListItem {
        text: "eggs".to_string(),
        done: false,
    }];

    store
        .set("list-shopping", &items, Origin::Local)
        .expect("set should succeed");
    assert!(store.is_dirty("list-shopping").expect("dirty check"));
    assert_eq!(store.count_dirty().expect("count"), 1);
    let read: Vec<ListItem> = store.get("list-shopping", Vec::new()).expect("get");
    assert_eq!(read, items);

    store.clear_dirty("list-shopping").expect("clear should succeed");
    assert!(!store.is_dirty("list-shopping").expect("dirty check"));
    let read: Vec<ListItem> = store.get("list-shopping", Vec::new()).expect("get");
    assert_eq!(read, items);

    cleanup_db_files(&path);
}

#[test]
fn remote_write_clears_existing_marker() {
    let (store, path) = open_store("daybook-store-remote");
    store
        .set("notes-2024-0-1", "draft", Origin::Local)
        .expect("local set");
    assert!(store.is_dirty("notes-2024-0-1").expect("dirty check"));

    store
        .set("notes-2024-0-1", "canonical", Origin::Remote)
        .expect("remote set");
    assert!(!store.is_dirty("notes-2024-0-1").expect("dirty check"));
    let text: String = store.get("notes-2024-0-1", String::new()).expect("get");
    assert_eq!(text, "canonical");

    cleanup_db_files(&path);
}

#[test]
fn malformed_payload_falls_back_to_default() {
    let (store, path) = open_store("daybook-store-malformed");
    store
        .set_raw("habits", "{not json", Origin::Local)
        .expect("raw set");
    let habits: Vec<String> = store
        .get("habits", vec!["fallback".to_string()])
        .expect("get never fails on bad payloads");
    assert_eq!(habits, vec!["fallback".to_string()]);

    let missing: Vec<String> = store.get("absent", Vec::new()).expect("get");
    assert!(missing.is_empty());

    cleanup_db_files(&path);
}

#[test]
fn delete_clears_marker_for_either_origin() {
    let (store, path) = open_store("daybook-store-delete");
    store.set("goals-2024-0-1", &["a"], Origin::Local).expect("set");
    store.set("goals-2024-0-2", &["b"], Origin::Local).expect("set");

    store
        .delete("goals-2024-0-1", Origin::Local)
        .expect("local delete");
    store
        .delete("goals-2024-0-2", Origin::Remote)
        .expect("remote delete");

    assert_eq!(store.count_dirty().expect("count"), 0);
    assert!(!store.contains("goals-2024-0-1").expect("contains"));
    assert!(!store.contains("goals-2024-0-2").expect("contains"));

    cleanup_db_files(&path);
}

#[test]
fn dirty_keys_strip_marker_prefix() {
    let (store, path) = open_store("daybook-store-dirty-keys");
    store.set("backlog", &serde_json::json!({}), Origin::Local).expect("set");
    store.set("habits", &Vec::<String>::new(), Origin::Local).expect("set");
    store.set("notes-2024-0-1", "x", Origin::Remote).expect("set");

    assert_eq!(
        store.dirty_keys().expect("dirty keys"),
        vec!["backlog".to_string(), "habits".to_string()]
    );
    let keys = store.entries().expect("entries");
    assert!(keys.iter().all(|(key, _)| !key.starts_with("dirty_")));
    assert_eq!(keys.len(), 3);

    cleanup_db_files(&path);
}

#[test]
fn untracked_writes_never_create_markers() {
    let (store, path) = open_store("daybook-store-untracked");
    store
        .set_untracked("habitsData-2024-W1-h0-d0", &true)
        .expect("untracked set");
    assert!(store.contains("habitsData-2024-W1-h0-d0").expect("contains"));
    assert_eq!(store.count_dirty().expect("count"), 0);

    store
        .remove_untracked("habitsData-2024-W1-h0-d0")
        .expect("untracked remove");
    assert!(!store.contains("habitsData-2024-W1-h0-d0").expect("contains"));

    cleanup_db_files(&path);
}

#[test]
fn status_listener_sees_dirty_count_after_each_mutation() {
    let (mut store, path) = open_store("daybook-store-listener");
    let seen = Rc::new(Cell::new(usize::MAX));
    let sink = Rc::clone(&seen);
    store.set_status_listener(move |count| sink.set(count));

    store.set("habits", &["Run"], Origin::Local).expect("set");
    assert_eq!(seen.get(), 1);
    store.set("backlog", &serde_json::json!({}), Origin::Local).expect("set");
    assert_eq!(seen.get(), 2);
    store.clear_dirty("habits").expect("clear");
    assert_eq!(seen.get(), 1);
    store.delete("backlog", Origin::Local).expect("delete");
    assert_eq!(seen.get(), 0);

    cleanup_db_files(&path);
}

#[test]
fn replace_all_drops_markers_and_previous_records() {
    let (store, path) = open_store("daybook-store-replace");
    store.set("stale", "x", Origin::Local).expect("set");

    store
        .replace_all(&[
            ("notes-2024-0-1".to_string(), "\"hello\"".to_string()),
            ("dirty_notes-2024-0-1".to_string(), "1".to_string()),
        ])
        .expect("replace");

    assert!(!store.contains("stale").expect("contains"));
    assert_eq!(store.count_dirty().expect("count"), 0);
    let text: String = store.get("notes-2024-0-1", String::new()).expect("get");
    assert_eq!(text, "hello");

    cleanup_db_files(&path);
}
