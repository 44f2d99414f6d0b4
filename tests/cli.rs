//! Smoke tests of the `loggable` binary

use assert_cmd::Command;
use chrono::Utc;
use loggable::audit::{Action, ChangeLogRecord, ChangeLogStore, JsonlChangeLog, NO_VALUE};
use predicates::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

fn loggable(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("loggable").unwrap();
    cmd.env("LOGGABLE_DATA_DIR", dir.path()).env_remove("RUST_LOG");
    cmd
}

fn record(action: Action, object_id: &str, raw_diff: &str) -> ChangeLogRecord {
    ChangeLogRecord {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        deleted_at: None,
        action,
        object_id: object_id.into(),
        object_type: "User".into(),
        raw_object: format!(r#"{{"id":{},"name":"b"}}"#, object_id),
        raw_meta: NO_VALUE.into(),
        raw_diff: raw_diff.into(),
    }
}

fn seeded() -> (TempDir, Vec<ChangeLogRecord>) {
    let dir = TempDir::new().unwrap();
    let store = JsonlChangeLog::new(dir.path().join("changelog.jsonl"));
    let records = vec![
        record(Action::Create, "1", NO_VALUE),
        record(Action::Update, "1", r#"{"name":"b"}"#),
        record(Action::Create, "2", NO_VALUE),
    ];
    for r in &records {
        store.append(r).unwrap();
    }
    (dir, records)
}

#[test]
fn init_writes_settings() {
    let dir = TempDir::new().unwrap();

    loggable(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete!"));

    assert!(dir.path().join("config.json").exists());
    assert!(dir.path().join("data").is_dir());
}

#[test]
fn config_shows_paths_and_settings() {
    let (dir, _) = seeded();

    loggable(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("changelog.jsonl"))
        .stdout(predicate::str::contains("Compute diff:       false"))
        .stdout(predicate::str::contains("Records: 3"));
}

#[test]
fn log_list_filters_by_object() {
    let (dir, _) = seeded();

    loggable(&dir)
        .args(["log", "list", "--object", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 record(s)"))
        .stdout(predicate::str::contains("name: \"b\""));
}

#[test]
fn log_last_shows_latest_record() {
    let (dir, records) = seeded();

    loggable(&dir)
        .args(["log", "last", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(records[1].id.to_string()))
        .stdout(predicate::str::contains("Action:      update"));
}

#[test]
fn log_last_missing_object_fails() {
    let (dir, _) = seeded();

    loggable(&dir)
        .args(["log", "last", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn log_delete_hides_record() {
    let (dir, records) = seeded();
    let id = records[1].id.to_string();

    loggable(&dir)
        .args(["log", "delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted record"));

    loggable(&dir)
        .args(["log", "last", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Action:      create"));

    loggable(&dir)
        .args(["log", "last", "1", "--include-deleted"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn export_csv_to_file() {
    let (dir, _) = seeded();
    let output = dir.path().join("out.csv");

    loggable(&dir)
        .args(["export", "csv", "-o"])
        .arg(&output)
        .assert()
        .success();

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents.lines().count(), 4);
}

#[test]
fn export_json_to_stdout() {
    let (dir, _) = seeded();

    let assert = loggable(&dir).args(["export", "json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();

    let export: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(export["metadata"]["record_count"], 3);
    assert_eq!(export["records"].as_array().unwrap().len(), 3);
}
