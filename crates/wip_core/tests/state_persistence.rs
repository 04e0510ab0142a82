use rusqlite::{params, Connection};
use std::fs;
use wip_core::db::{open_db, open_db_in_memory};
use wip_core::{
    ArchiveRecord, JsonStateRepository, NavigationService, Node, RepoError, SqliteStateRepository,
    StateRepository, TreeStore,
};

fn sample_store() -> TreeStore {
    let mut alpha = Node::with_timestamp("alpha", Some("first line\nsecond".to_string()), 100);
    let mut beta = Node::with_timestamp("beta", None, 200);
    beta.children.push(Node::with_timestamp("leaf", None, 300));
    alpha.children.push(beta);
    alpha.children.push(Node::with_timestamp("gamma", Some("g".to_string()), 250));

    let mut root = Node::with_timestamp("Root", None, 1);
    root.children.push(alpha);
    root.children.push(Node::with_timestamp("zeta", None, 400));

    let archive = vec![ArchiveRecord {
        name: "old".to_string(),
        notes: Some("gone".to_string()),
        path: "/alpha/old".to_string(),
        created_at: 50,
        archived_at: 60,
    }];
    TreeStore::from_parts(
        root,
        vec!["alpha".to_string(), "beta".to_string()],
        archive,
    )
}

#[test]
fn sqlite_round_trip_preserves_tree_focus_and_archive() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();
    let store = sample_store();

    repo.save(&store).unwrap();
    let loaded = repo.load().unwrap();

    assert_eq!(loaded, store);
    let names: Vec<&str> = loaded
        .resolve_path(&["alpha"])
        .unwrap()
        .children
        .iter()
        .map(|child| child.name.as_str())
        .collect();
    assert_eq!(names, vec!["beta", "gamma"]);
}

#[test]
fn sqlite_state_survives_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wip.sqlite3");
    let store = sample_store();
    {
        let conn = open_db(&path).unwrap();
        let repo = SqliteStateRepository::try_new(&conn).unwrap();
        repo.save(&store).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();
    assert_eq!(repo.load().unwrap(), store);
}

#[test]
fn empty_sqlite_database_loads_fresh_store() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();

    let store = repo.load().unwrap();
    assert_eq!(store.node_count(), 1);
    assert!(store.is_at_root());
    assert!(store.archive().is_empty());
}

#[test]
fn sqlite_archive_is_appended_across_saves() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();
    let mut service = NavigationService::open(&repo).unwrap();
    service.push("one", None).unwrap();
    service.pop().unwrap();
    service.push("two", None).unwrap();
    service.pop().unwrap();

    let rows: Vec<(i64, String)> = conn
        .prepare("SELECT seq, path FROM archive ORDER BY seq;")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![(1, "/one".to_string()), (2, "/two".to_string())]
    );
}

#[test]
fn sqlite_orphan_rows_are_corrupt_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute(
        "INSERT INTO nodes (node_id, parent_id, position, name, notes, created_at)
         VALUES (?1, NULL, 0, 'Root', NULL, 1), (?2, ?3, 0, 'orphan', NULL, 2);",
        params![1, 2, 99],
    )
    .unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();

    let err = repo.load().unwrap_err();
    assert!(err.is_corrupt_state(), "unexpected error: {err}");
}

#[test]
fn sqlite_rows_without_root_are_corrupt_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "PRAGMA foreign_keys = OFF;
         INSERT INTO nodes (node_id, parent_id, position, name, notes, created_at)
         VALUES (1, 2, 0, 'a', NULL, 1), (2, 1, 0, 'b', NULL, 1);",
    )
    .unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();

    assert!(repo.load().unwrap_err().is_corrupt_state());
}

#[test]
fn sqlite_wrong_column_type_is_corrupt_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO nodes (node_id, parent_id, position, name, notes, created_at)
         VALUES (1, NULL, 0, 'Root', NULL, 'yesterday');",
    )
    .unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();

    assert!(repo.load().unwrap_err().is_corrupt_state());
}

#[test]
fn sqlite_focus_without_nodes_is_corrupt_state() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("INSERT INTO focus (depth, name) VALUES (0, 'alpha');")
        .unwrap();
    let repo = SqliteStateRepository::try_new(&conn).unwrap();

    assert!(repo.load().unwrap_err().is_corrupt_state());
}

#[test]
fn json_round_trip_preserves_tree_focus_and_archive() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonStateRepository::new(dir.path().join("nested").join("state.json"));
    let store = sample_store();

    repo.save(&store).unwrap();
    assert!(repo.path().exists());
    assert_eq!(repo.load().unwrap(), store);

    let leftovers: Vec<_> = fs::read_dir(repo.path().parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("state.json")]);
}

#[test]
fn json_document_uses_documented_keys() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonStateRepository::new(dir.path().join("state.json"));
    repo.save(&sample_store()).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(repo.path()).unwrap()).unwrap();
    assert_eq!(value["root"]["name"], "Root");
    assert_eq!(value["root"]["children"][0]["name"], "alpha");
    assert_eq!(value["current_path"], serde_json::json!(["alpha", "beta"]));
    assert_eq!(value["archive"][0]["path"], "/alpha/old");
}

#[test]
fn json_deep_focus_chain_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonStateRepository::new(dir.path().join("state.json"));
    let mut service = NavigationService::open(&repo).unwrap();
    for depth in 0..200 {
        service.push(&format!("n{depth}"), None).unwrap();
    }

    let loaded = repo.load().unwrap();
    assert_eq!(loaded.focus_path().len(), 200);
    assert_eq!(loaded.node_count(), 201);
    assert_eq!(loaded.current_node().name, "n199");

    let reopened = NavigationService::open(&repo).unwrap();
    assert!(reopened.focus_warning().is_none());
    assert_eq!(reopened.path(), service.path());
}

#[test]
fn json_document_with_trailing_garbage_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{"root":{"name":"Root","created_at":1}} trailing"#,
    )
    .unwrap();

    assert!(JsonStateRepository::new(&path)
        .load()
        .unwrap_err()
        .is_corrupt_state());
}

#[test]
fn missing_json_document_loads_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let repo = JsonStateRepository::new(dir.path().join("state.json"));

    let store = repo.load().unwrap();
    assert_eq!(store.node_count(), 1);
    assert!(!repo.path().exists());
}

#[test]
fn malformed_json_document_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{ \"root\": [").unwrap();

    let err = JsonStateRepository::new(&path).load().unwrap_err();
    assert!(matches!(err, RepoError::CorruptState(_)));
}

#[test]
fn json_document_with_invalid_name_is_corrupt_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{"root":{"name":"Root","created_at":1,"children":[{"name":"a/b","created_at":2}]}}"#,
    )
    .unwrap();

    assert!(JsonStateRepository::new(&path)
        .load()
        .unwrap_err()
        .is_corrupt_state());
}

#[test]
fn json_stale_focus_is_repaired_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{"root":{"name":"Root","created_at":1,"children":[{"name":"a","created_at":2}]},
            "current_path":["a","b"]}"#,
    )
    .unwrap();
    let repo = JsonStateRepository::new(&path);

    let service = NavigationService::open(&repo).unwrap();
    assert_eq!(service.path(), "/a");
    assert!(service.focus_warning().unwrap().contains("`b`"));
    assert_eq!(repo.load().unwrap().focus_path(), ["a".to_string()]);
}

#[test]
fn loaded_duplicate_siblings_resolve_to_first_match() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{"root":{"name":"Root","created_at":1,"children":[
              {"name":"dup","notes":"first","created_at":2},
              {"name":"dup","notes":"second","created_at":3}]},
            "current_path":["dup"]}"#,
    )
    .unwrap();

    let service = NavigationService::open(JsonStateRepository::new(&path)).unwrap();
    assert_eq!(
        service.store().current_node().notes.as_deref(),
        Some("first")
    );
}

#[test]
fn unmigrated_file_is_not_used_by_repository() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wip.sqlite3");
    Connection::open(&path).unwrap();

    let conn = Connection::open(&path).unwrap();
    assert!(SqliteStateRepository::try_new(&conn).is_err());
}
