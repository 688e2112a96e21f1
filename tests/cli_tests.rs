//! End-to-end tests of the `csync` binary.
//!
//! Every test points `--db` at a fresh temporary database, so nothing here
//! touches the user's home directory. Stdout is not a terminal under
//! `assert_cmd`, which puts the binary in JSON mode.

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
    "contacts": [
        {
            "id": 1,
            "display_name": "John Doe",
            "is_favorite": true,
            "phone_numbers": [{"number": "(123) 456-7890", "type": "MOBILE"}],
            "group_ids": [10, 11],
            "account_type": "com.google"
        },
        {
            "id": 2,
            "display_name": "john doe",
            "phone_numbers": [{"number": "555-0000", "type": "HOME"}],
            "emails": [{"email": "jd@example.com", "type": "WORK"}]
        },
        {
            "id": 3,
            "display_name": "Alice Anderson",
            "phone_numbers": [{"number": "111-1111", "type": "MOBILE"}]
        }
    ],
    "groups": [
        {"id": 10, "title": "Starred in Android", "system_id": "Starred in Android", "contact_count": 1},
        {"id": 11, "title": "Starred in Android", "system_id": "Starred in Android", "contact_count": 2}
    ]
}"#;

struct Workspace {
    _dir: TempDir,
    db: PathBuf,
    snapshot: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("data").join("contacts.db");
        let snapshot = dir.path().join("snapshot.json");
        std::fs::write(&snapshot, SNAPSHOT).unwrap();
        Self {
            _dir: dir,
            db,
            snapshot,
        }
    }

    fn csync(&self) -> Command {
        let mut cmd = Command::cargo_bin("csync").unwrap();
        cmd.env_remove("CSYNC_DB")
            .env_remove("CSYNC_TEST_DB")
            .env_remove("CONTACTSYNC_DB")
            .env_remove("CONTACTSYNC_SNAPSHOT")
            .env_remove("RUST_LOG")
            .arg("--db")
            .arg(&self.db);
        cmd
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let output = self.csync().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "args: {args:?}\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn sync(&self) -> Value {
        let snapshot = path_str(&self.snapshot);
        self.run_json(&["sync", "--snapshot", &snapshot])
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[test]
fn status_before_init_reports_not_initialized() {
    let ws = Workspace::new();
    let output = ws.csync().arg("status").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "NOT_INITIALIZED");
}

#[test]
fn init_creates_empty_database() {
    let ws = Workspace::new();
    let init = ws.run_json(&["init"]);
    assert_eq!(init["schema_version"], 7);
    assert!(ws.db.exists());

    let status = ws.run_json(&["status"]);
    assert_eq!(status["counts"]["contacts"], 0);
    assert_eq!(status["schema_version"], 7);

    let again = ws.csync().arg("init").output().unwrap();
    assert_eq!(again.status.code(), Some(2));
}

#[test]
fn sync_imports_snapshot_and_is_idempotent() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);

    let first = ws.sync();
    assert_eq!(first["report"]["contacts"]["inserted"], 3);
    assert_eq!(first["report"]["groups"]["raw"], 2);
    assert_eq!(first["report"]["groups"]["deduplicated"], 1);

    let second = ws.sync();
    assert_eq!(second["report"]["contacts"]["inserted"], 0);
    assert_eq!(second["report"]["contacts"]["updated"], 0);
    assert_eq!(second["report"]["contacts"]["deleted"], 0);
    assert_eq!(second["report"]["contacts"]["unchanged"], 3);

    let groups = ws.run_json(&["groups", "list"]);
    assert_eq!(groups["count"], 1);
    assert_eq!(groups["groups"][0]["name"], "Favorites");
    assert_eq!(groups["groups"][0]["contact_count"], 1);

    let john = ws.run_json(&["contacts", "show", "1"]);
    assert_eq!(john["first_name"], "John");
    assert_eq!(john["source"], "Google");
    assert_eq!(john["is_favorite"], true);
}

#[test]
fn dry_run_sync_writes_nothing() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);

    let snapshot = path_str(&ws.snapshot);
    let report = ws.run_json(&["--dry-run", "sync", "--snapshot", &snapshot]);
    assert_eq!(report["report"]["dry_run"], true);
    assert_eq!(report["report"]["contacts"]["inserted"], 3);

    let contacts = ws.run_json(&["contacts", "list"]);
    assert_eq!(contacts["count"], 0);
}

#[test]
fn missing_snapshot_is_a_provider_error() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);

    let output = ws
        .csync()
        .args(["sync", "--snapshot"])
        .arg(ws.db.with_file_name("absent.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
}

#[test]
fn duplicates_then_merge() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);
    ws.sync();

    let dups = ws.run_json(&["duplicates"]);
    assert_eq!(dups["count"], 1);
    assert_eq!(dups["groups"][0]["reason"], "SAME_NAME");
    assert_eq!(dups["groups"][0]["contact_ids"], serde_json::json!([1, 2]));

    let merged = ws.run_json(&["merge", "1", "2"]);
    assert_eq!(merged["id"], 1);

    let john = ws.run_json(&["contacts", "show", "1"]);
    assert_eq!(john["phone_numbers"].as_array().unwrap().len(), 2);
    assert_eq!(john["emails"][0]["email"], "jd@example.com");

    let gone = ws.csync().args(["contacts", "show", "2"]).output().unwrap();
    assert_eq!(gone.status.code(), Some(3));

    let none_left = ws.run_json(&["duplicates"]);
    assert_eq!(none_left["count"], 0);
}

#[test]
fn merge_needs_two_ids() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);
    ws.sync();

    let output = ws.csync().args(["merge", "1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn dry_run_merge_applies_the_same_id_checks() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);
    ws.sync();

    let single = ws.csync().args(["--dry-run", "merge", "1"]).output().unwrap();
    assert_eq!(single.status.code(), Some(4));
    let err: Value = serde_json::from_slice(&single.stderr).unwrap();
    assert_eq!(err["error"]["code"], "INVALID_ARGUMENT");

    let repeated = ws
        .csync()
        .args(["--dry-run", "merge", "1", "1"])
        .output()
        .unwrap();
    assert_eq!(repeated.status.code(), Some(4));

    let preview = ws.run_json(&["--dry-run", "merge", "1", "2"]);
    assert_eq!(preview["dry_run"], true);
    assert_eq!(preview["target"], 1);

    let contacts = ws.run_json(&["contacts", "list"]);
    assert_eq!(contacts["count"], 3);
}

#[test]
fn favorite_toggle_and_filter() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);
    ws.sync();

    ws.run_json(&["contacts", "favorite", "3"]);
    let favorites = ws.run_json(&["contacts", "list", "--favorites"]);
    assert_eq!(favorites["count"], 2);

    ws.run_json(&["contacts", "favorite", "3", "--off"]);
    let favorites = ws.run_json(&["contacts", "list", "--favorites"]);
    assert_eq!(favorites["count"], 1);
}

#[test]
fn restore_with_nothing_staged() {
    let ws = Workspace::new();
    ws.run_json(&["init"]);

    let report = ws.run_json(&["restore"]);
    assert_eq!(report["restored"], 0);
    assert!(report["phase"].is_null());
}
