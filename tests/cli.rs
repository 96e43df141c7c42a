//! End-to-end tests for the `convq` binary.

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

fn convq(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("convq").unwrap();
    cmd.env_remove("CONVQ_DB")
        .env_remove("CONVQ_BATCH_SIZE")
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(db)
        .arg("--json");
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

const ITEMS: &str = r#"[
  {"creative_set_id": "set", "creative_instance_id": "late",
   "ad_type": "search_result_ad", "action_type": "click_through",
   "process_at": "2024-01-02T00:00:00Z"},
  {"creative_set_id": "set", "creative_instance_id": "early",
   "process_at": "2024-01-01T00:00:00Z"},
  {"creative_set_id": "set", "creative_instance_id": ""}
]"#;

#[test]
fn test_queue_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data").join("queue.db");
    let input = dir.path().join("items.json");
    std::fs::write(&input, ITEMS).unwrap();

    let migrated = stdout_json(convq(&db).arg("migrate"));
    assert_eq!(migrated["outcome"], "created");
    assert_eq!(migrated["version"], 35);

    let saved = stdout_json(convq(&db).arg("save").arg(&input));
    assert_eq!(saved["saved"], 2);
    assert_eq!(saved["dropped"], 1);

    let all = stdout_json(convq(&db).arg("list"));
    assert_eq!(all["count"], 2);
    assert_eq!(all["items"][0]["creative_instance_id"], "early");
    assert_eq!(all["items"][1]["action_type"], "click_through");

    let next = stdout_json(convq(&db).arg("next"));
    assert_eq!(next["items"][0]["creative_instance_id"], "early");

    convq(&db).args(["mark-processed", "early"]).assert().success();
    convq(&db).args(["mark-processed", "early"]).assert().success();

    let next = stdout_json(convq(&db).arg("next"));
    assert_eq!(next["items"][0]["creative_instance_id"], "late");

    let keyed = stdout_json(convq(&db).args(["get", "early"]));
    assert_eq!(keyed["creative_instance_id"], "early");
    assert_eq!(keyed["items"][0]["was_processed"], true);

    convq(&db).args(["delete", "late"]).assert().success();
    let all = stdout_json(convq(&db).arg("list"));
    assert_eq!(all["count"], 1);
}

#[test]
fn test_commands_require_migrated_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("missing.db");

    convq(&db).arg("list").assert().failure().code(2);
}

#[test]
fn test_get_rejects_empty_key() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");
    convq(&db).arg("migrate").assert().success();

    convq(&db).args(["get", ""]).assert().failure().code(4);
}

#[test]
fn test_zero_batch_size_is_config_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");
    let input = dir.path().join("items.json");
    std::fs::write(&input, ITEMS).unwrap();
    convq(&db).arg("migrate").assert().success();

    convq(&db)
        .args(["--batch-size", "0", "save"])
        .arg(&input)
        .assert()
        .failure()
        .code(7);
}

#[test]
fn test_migrate_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");

    convq(&db).arg("migrate").assert().success();
    let again = stdout_json(convq(&db).arg("migrate"));
    assert_eq!(again["outcome"], "up_to_date");
}

#[test]
fn test_quiet_suppresses_json_listing() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");
    convq(&db).arg("migrate").assert().success();

    convq(&db).args(["-q", "list"]).assert().success().stdout("");
    convq(&db).args(["-q", "next"]).assert().success().stdout("");
}

#[test]
fn test_migrate_from_refuses_recorded_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");
    let input = dir.path().join("items.json");
    std::fs::write(&input, ITEMS).unwrap();
    convq(&db).arg("migrate").assert().success();
    convq(&db).arg("save").arg(&input).assert().success();

    convq(&db).args(["migrate", "--from", "9"]).assert().failure().code(2);

    let all = stdout_json(convq(&db).arg("list"));
    assert_eq!(all["count"], 2);
}

#[test]
fn test_oversized_batch_is_config_error() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("queue.db");
    let input = dir.path().join("items.json");
    std::fs::write(&input, ITEMS).unwrap();
    convq(&db).arg("migrate").assert().success();

    convq(&db)
        .args(["--batch-size", "3000", "save"])
        .arg(&input)
        .assert()
        .failure()
        .code(7);
}
