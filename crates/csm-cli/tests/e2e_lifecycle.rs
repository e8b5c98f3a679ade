//! End-to-end CLI tests for task/account CRUD, OKR reporting, and error
//! rendering. Each test runs the `csm` binary in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

/// Build a Command targeting the csm binary, rooted in `dir`.
fn csm_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("csm"));
    cmd.current_dir(dir);
    // Keep the developer's own config and env out of the picture.
    cmd.env("HOME", dir);
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env_remove("FORMAT");
    cmd.env_remove("CSM_TASK_KEY");
    cmd.env_remove("CSM_ACCOUNT_KEY");
    cmd.env("CSM_LOG", "error");
    cmd
}

fn init_project() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    csm_cmd(dir.path()).args(["init"]).assert().success();
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let output = csm_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("csm should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

fn id_of(value: &Value) -> String {
    value["id"].as_i64().expect("numeric id").to_string()
}

#[test]
fn commands_outside_a_project_fail_with_init_hint() {
    let dir = tempfile::tempdir().expect("temp dir");
    csm_cmd(dir.path())
        .args(["task", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no .csm directory found"))
        .stderr(predicate::str::contains("csm init"));
}

#[test]
fn init_twice_requires_force() {
    let dir = init_project();
    csm_cmd(dir.path())
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    csm_cmd(dir.path())
        .args(["init", "--force", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"reinitialized\": true"));
}

#[test]
fn task_lifecycle_add_toggle_update_delete() {
    let dir = init_project();
    let acme = run_json(dir.path(), &["account", "add", "Acme", "--vertical", "fins"]);
    assert_eq!(acme["vertical"], "FINS");

    let task = run_json(
        dir.path(),
        &[
            "task",
            "add",
            "Renewal at risk",
            "--type",
            "risk",
            "--due",
            "2026-11-30",
            "--account",
            &id_of(&acme),
        ],
    );
    assert_eq!(task["type"], "Risk");
    assert_eq!(task["completed"], false);
    assert_eq!(task["account_name"], "Acme");
    let id = id_of(&task);

    let toggled = run_json(dir.path(), &["task", "toggle", &id]);
    assert_eq!(toggled["completed"], true);

    let updated = run_json(
        dir.path(),
        &["task", "update", &id, "--name", "Renewal saved", "--clear-due"],
    );
    assert_eq!(updated["name"], "Renewal saved");
    assert_eq!(updated["due"], Value::Null);
    assert_eq!(updated["completed"], true);

    let deleted = run_json(dir.path(), &["task", "delete", &id, "--force"]);
    assert_eq!(deleted["deleted"], true);
    let again = run_json(dir.path(), &["task", "delete", &id, "--force"]);
    assert_eq!(again["deleted"], false);

    let list = run_json(dir.path(), &["task", "list"]);
    assert_eq!(list, Value::Array(Vec::new()));
}

#[test]
fn list_filters_by_search_and_type() {
    let dir = init_project();
    for (name, ty) in [
        ("Churn risk call", "Risk"),
        ("Upsell analytics", "Upsell"),
        ("Risk register story", "Story"),
    ] {
        run_json(dir.path(), &["task", "add", name, "--type", ty]);
    }

    let hits = run_json(dir.path(), &["task", "list", "--search", "RISK"]);
    assert_eq!(hits.as_array().map(Vec::len), Some(2));

    let stories = run_json(
        dir.path(),
        &["task", "list", "--search", "risk", "--type", "story"],
    );
    assert_eq!(stories[0]["name"], "Risk register story");

    csm_cmd(dir.path())
        .args(["task", "list", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ID\tTYPE\tNAME"));
}

#[test]
fn invalid_input_is_reported_with_code() {
    let dir = init_project();
    let output = csm_cmd(dir.path())
        .args(["task", "add", "Exec sync", "--type", "Meeting", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json error");
    assert_eq!(err["error"]["error_code"], "E2002");

    csm_cmd(dir.path())
        .args(["task", "add", "Exec sync", "--type", "EBC", "--due", "soon"])
        .assert()
        .code(2)
        .stderr(predicate::str::starts_with("error:"));

    let list = run_json(dir.path(), &["task", "list"]);
    assert_eq!(list, Value::Array(Vec::new()));
}

#[test]
fn show_unknown_record_is_not_found() {
    let dir = init_project();
    let output = csm_cmd(dir.path())
        .args(["account", "show", "42", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("json error");
    assert_eq!(err["error"]["error_code"], "E2003");
    assert_eq!(err["error"]["message"], "account 42 not found");
}

#[test]
fn account_rename_keeps_task_snapshot_and_delete_does_not_cascade() {
    let dir = init_project();
    let acme = id_of(&run_json(dir.path(), &["account", "add", "Acme"]));
    let task = id_of(&run_json(
        dir.path(),
        &["task", "add", "Exec briefing", "--type", "EBC", "--account", &acme],
    ));

    run_json(dir.path(), &["account", "update", &acme, "--name", "Acme Corp"]);
    let stale = run_json(dir.path(), &["task", "show", &task]);
    assert_eq!(stale["account_name"], "Acme");

    run_json(dir.path(), &["account", "delete", &acme, "--force"]);
    let orphan = run_json(dir.path(), &["task", "show", &task]);
    assert_eq!(orphan["account_id"].as_i64().map(|v| v.to_string()), Some(acme));
    assert_eq!(orphan["account_name"], "Acme");
}

#[test]
fn okr_targets_drive_progress() {
    let dir = init_project();
    for name in ["A", "B", "C"] {
        let id = id_of(&run_json(dir.path(), &["task", "add", name, "--type", "Upsell"]));
        if name != "C" {
            run_json(dir.path(), &["task", "toggle", &id]);
        }
    }

    let progress = run_json(dir.path(), &["okr", "show"]);
    let upsell = &progress[1];
    assert_eq!(upsell["type"], "Upsell");
    assert_eq!(upsell["completed"], 2);
    assert_eq!(upsell["total"], 3);
    assert_eq!(upsell["target"], 4);

    let progress = run_json(dir.path(), &["okr", "set-target", "upsell", "2"]);
    assert_eq!(progress[1]["target"], 2);
    assert_eq!(progress[1]["percent_complete"], 100.0);

    csm_cmd(dir.path())
        .args(["okr", "set-target", "Upsell", "0"])
        .assert()
        .failure();
}

#[test]
fn verticals_work_without_a_project() {
    let dir = tempfile::tempdir().expect("temp dir");
    let verticals = run_json(dir.path(), &["account", "verticals"]);
    let names: Vec<_> = verticals
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v["vertical"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(names.contains(&"Public Sector".to_string()));
    assert_eq!(names.len(), 6);
}

#[test]
fn subdirectories_find_the_project() {
    let dir = init_project();
    let nested = dir.path().join("notes/q3");
    std::fs::create_dir_all(&nested).expect("mkdir");
    run_json(&nested, &["task", "add", "From a subdir", "--type", "Story"]);
    let list = run_json(dir.path(), &["task", "list"]);
    assert_eq!(list[0]["name"], "From a subdir");
}

#[test]
fn completions_emit_a_script() {
    let dir = tempfile::tempdir().expect("temp dir");
    csm_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("csm"));
}
