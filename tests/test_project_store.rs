//! Integration tests for the SQLite project store.
//!
//! These tests require the `isqlite` Cargo feature (on by default):
//!
//! ```bash
//! cargo test --test test_project_store --features isqlite
//! ```

use serde_json::json;
use tapestry::graph::Graph;
use tapestry::store::{ProjectData, ProjectStore};
use tapestry::turn::ChatMessage;
use tempfile::TempDir;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn make_store() -> (TempDir, ProjectStore) {
    let temp = TempDir::new().expect("tempdir");
    let store = ProjectStore::open(&temp.path().join("tapestry.db")).expect("open project store");
    (temp, store)
}

// ── CRUD ──────────────────────────────────────────────────────────────────────

#[test]
fn create_then_get_returns_blob() {
    let (_temp, store) = make_store();
    let summary = store.create("Family", Some(json!({"nodes": [], "theme": "dark"}))).unwrap();
    assert!(!summary.id.is_empty());
    assert!(!summary.updated_at.is_empty());

    let project = store.get(&summary.id).unwrap().expect("project exists");
    assert_eq!(project.name, "Family");
    assert_eq!(project.data, json!({"nodes": [], "theme": "dark"}));
    assert_eq!(project.updated_at, summary.updated_at);
}

#[test]
fn create_without_data_stores_empty_object() {
    let (_temp, store) = make_store();
    let id = store.create("Empty", None).unwrap().id;
    assert_eq!(store.get(&id).unwrap().unwrap().data, json!({}));
}

#[test]
fn ids_are_unique() {
    let (_temp, store) = make_store();
    let a = store.create("Same", None).unwrap();
    let b = store.create("Same", None).unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn list_is_most_recent_first() {
    let (_temp, store) = make_store();
    let first = store.create("first", None).unwrap();
    let second = store.create("second", None).unwrap();
    let third = store.create("third", None).unwrap();

    let order: Vec<_> = store.list().unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(order, vec![third.id.clone(), second.id.clone(), first.id.clone()]);

    std::thread::sleep(std::time::Duration::from_millis(5));
    assert!(store.update(&first.id, Some("first again"), None).unwrap());
    let order: Vec<_> = store.list().unwrap().into_iter().map(|p| p.id).collect();
    assert_eq!(order[0], first.id);
}

#[test]
fn update_name_keeps_data_and_vice_versa() {
    let (_temp, store) = make_store();
    let id = store.create("Old", Some(json!({"a": 1}))).unwrap().id;

    assert!(store.update(&id, Some("New"), None).unwrap());
    let p = store.get(&id).unwrap().unwrap();
    assert_eq!((p.name.as_str(), &p.data), ("New", &json!({"a": 1})));

    assert!(store.update(&id, None, Some(&json!({"b": 2}))).unwrap());
    let p = store.get(&id).unwrap().unwrap();
    assert_eq!((p.name.as_str(), &p.data), ("New", &json!({"b": 2})));
}

#[test]
fn update_and_delete_of_missing_project_report_false() {
    let (_temp, store) = make_store();
    assert!(!store.update("missing", Some("x"), None).unwrap());
    assert!(!store.delete("missing").unwrap());
    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn delete_removes_row() {
    let (_temp, store) = make_store();
    let id = store.create("Doomed", None).unwrap().id;
    assert!(store.delete(&id).unwrap());
    assert!(store.get(&id).unwrap().is_none());
    assert!(store.list().unwrap().is_empty());
}

// ── Typed project data ────────────────────────────────────────────────────────

#[test]
fn project_data_round_trips_through_store() {
    let (_temp, store) = make_store();
    let id = store
        .create("Story", Some(json!({"layout": "force", "nodes": [], "edges": []})))
        .unwrap()
        .id;

    let mut data = ProjectData::from_value(store.get(&id).unwrap().unwrap().data).unwrap();
    assert_eq!(data.graph, Graph::default());
    data.messages.push(ChatMessage::user("Alice lives in Paris"));
    data.messages.push(ChatMessage::assistant("How long has she lived there?"));
    assert!(store.update(&id, None, Some(&data.to_value().unwrap())).unwrap());

    let stored = store.get(&id).unwrap().unwrap().data;
    assert_eq!(stored["layout"], "force");
    assert_eq!(stored["messages"][1]["role"], "assistant");
    assert_eq!(ProjectData::from_value(stored).unwrap(), data);
}
