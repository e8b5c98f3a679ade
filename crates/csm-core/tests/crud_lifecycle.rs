//! Session-level CRUD behaviour against an on-disk store.

use csm_core::config::StorageKeys;
use csm_core::error::CsmError;
use csm_core::model::{AccountInput, TaskInput, TaskType, Vertical};
use csm_core::query::TaskQuery;
use csm_core::session::Session;
use tempfile::TempDir;

fn session_in(dir: &TempDir) -> Session {
    Session::new(dir.path().join(".csm/csm.sqlite3"), StorageKeys::default())
}

#[test]
fn added_task_is_listed_once_and_incomplete() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);

    let before = session.list_tasks().expect("list").len();
    let added = session
        .add_task(
            &TaskInput::new("Renewal risk review", "Risk")
                .due("2026-12-01")
                .completed(true),
        )
        .expect("add");

    let tasks = session.list_tasks().expect("list");
    assert_eq!(tasks.len(), before + 1);
    let matching: Vec<_> = tasks.iter().filter(|t| t.id == added.id).collect();
    assert_eq!(matching.len(), 1);
    let stored = matching[0];
    assert_eq!(stored.name, "Renewal risk review");
    assert_eq!(stored.task_type, TaskType::Risk);
    assert_eq!(
        stored.due.map(|d| d.to_string()).as_deref(),
        Some("2026-12-01")
    );
    assert!(!stored.completed);
}

#[test]
fn invalid_input_writes_nothing() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);

    for input in [
        TaskInput::new("  ", "Risk"),
        TaskInput::new("Exec sync", "Meeting"),
        TaskInput::new("Exec sync", "EBC").due("next tuesday"),
    ] {
        assert!(session.add_task(&input).is_err(), "{input:?} should be rejected");
    }
    assert!(session.list_tasks().expect("list").is_empty());
}

#[test]
fn deleted_task_never_comes_back() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);

    let keep = session
        .add_task(&TaskInput::new("Keep", "Story"))
        .expect("add")
        .id
        .expect("id");
    let drop_id = session
        .add_task(&TaskInput::new("Drop", "Story"))
        .expect("add")
        .id
        .expect("id");

    assert!(session.delete_task(drop_id).expect("delete"));
    let ids: Vec<_> = session
        .list_tasks()
        .expect("list")
        .iter()
        .filter_map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![keep]);

    assert!(!session.delete_task(drop_id).expect("repeat delete is a no-op"));
    assert!(!session.delete_task(9_999).expect("unknown id is a no-op"));
}

#[test]
fn account_rename_leaves_task_snapshot_until_task_update() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);

    let acme = session
        .add_account(&AccountInput::new("Acme").vertical("FINS", Some("Banking")))
        .expect("account");
    assert_eq!(acme.vertical, Some(Vertical::Fins));
    let acme_id = acme.id.expect("id");

    let task = session
        .add_task(&TaskInput::new("Exec briefing", "EBC").account(acme_id))
        .expect("task");
    let task_id = task.id.expect("id");
    assert_eq!(task.account_name.as_deref(), Some("Acme"));

    session
        .update_account(
            acme_id,
            &AccountInput::new("Acme Corp").vertical("FINS", Some("Banking")),
        )
        .expect("rename");

    let stale = session.get_task(task_id).expect("get").expect("exists");
    assert_eq!(stale.account_name.as_deref(), Some("Acme"));

    let refreshed = session
        .update_task(task_id, &TaskInput::from(&stale))
        .expect("touch task");
    assert_eq!(refreshed.account_name.as_deref(), Some("Acme Corp"));
}

#[test]
fn deleting_an_account_does_not_cascade() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);

    let globex = session
        .add_account(&AccountInput::new("Globex"))
        .expect("account")
        .id
        .expect("id");
    let task_id = session
        .add_task(&TaskInput::new("Seat expansion", "Upsell").account(globex))
        .expect("task")
        .id
        .expect("id");

    assert!(session.delete_account(globex).expect("delete"));
    let orphan = session.get_task(task_id).expect("get").expect("still there");
    assert_eq!(orphan.account_id, Some(globex));
    assert_eq!(orphan.account_name.as_deref(), Some("Globex"));
}

#[test]
fn data_survives_a_new_session() {
    let dir = tempfile::tempdir().expect("temp dir");
    let id = {
        let mut session = session_in(&dir);
        let id = session
            .add_task(&TaskInput::new("Persisted", "Upsell"))
            .expect("add")
            .id
            .expect("id");
        session.toggle_task(id).expect("toggle");
        id
    };

    let mut reopened = session_in(&dir);
    let task = reopened.get_task(id).expect("get").expect("exists");
    assert!(task.completed);
}

#[test]
fn search_filters_by_name_and_type() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut session = session_in(&dir);
    for (name, ty) in [
        ("Churn risk call", "Risk"),
        ("Upsell analytics", "Upsell"),
        ("Risk register story", "Story"),
    ] {
        session.add_task(&TaskInput::new(name, ty)).expect("add");
    }

    let all = session.search(&TaskQuery::default()).expect("search");
    assert_eq!(all.len(), 3);

    let risky = session.search(&TaskQuery::new("RISK", None)).expect("search");
    assert_eq!(risky.len(), 2);
    assert_eq!(risky[0].name, "Churn risk call");

    let stories = session
        .search(&TaskQuery::new("risk", Some(TaskType::Story)))
        .expect("search");
    assert_eq!(stories.len(), 1);
}

#[test]
fn changed_storage_keys_are_refused() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(".csm/csm.sqlite3");
    Session::new(&path, StorageKeys::default())
        .list_tasks()
        .expect("create store");

    let keys = StorageKeys::new("team_tasks", "csm_accounts").expect("valid keys");
    let err = Session::new(&path, keys)
        .list_tasks()
        .expect_err("keys differ");
    assert!(matches!(err, CsmError::KeyMismatch { .. }));
}
