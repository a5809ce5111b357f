//! Integration tests for the Parlor command-line client.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use tempfile::TempDir;

const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn parlor(dir: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cli");
    cmd.current_dir(dir.path())
        .env_remove("PARLOR_API_URL")
        .env_remove("RUST_LOG")
        .timeout(std::time::Duration::from_secs(20));
    cmd
}

fn write_session(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("session.json");
    let user = serde_json::json!({
        "id": 7,
        "login": "asmith",
        "nom": "Smith",
        "prenoms": "Alice"
    });
    fs::write(&path, user.to_string()).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    parlor(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("conversations"))
        .stdout(predicates::str::contains("send"))
        .stdout(predicates::str::contains("group"))
        .stdout(predicates::str::contains("export"));
}

#[test]
fn test_completion_script_names_the_binary() {
    let dir = TempDir::new().unwrap();
    parlor(&dir)
        .args(["completion", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicates::str::contains("parlor"));
}

#[test]
fn test_config_generates_yaml_and_json() {
    let dir = TempDir::new().unwrap();
    parlor(&dir).arg("config").assert().success();
    let yaml = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
    assert!(yaml.contains("api_url"));

    parlor(&dir)
        .args(["config", "--format", "json"])
        .assert()
        .success();
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("config.json")).unwrap())
            .unwrap();
    assert!(json.get("api_url").is_some());
}

#[test]
fn test_config_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    parlor(&dir)
        .args(["config", "--format", "toml"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Unsupported format"));
}

#[test]
fn test_conversations_require_a_session() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    parlor(&dir)
        .arg("conversations")
        .arg("--session-file")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicates::str::contains("no active session"));
}

#[test]
fn test_conversations_report_unreachable_server() {
    let dir = TempDir::new().unwrap();
    let session = write_session(&dir);
    parlor(&dir)
        .arg("conversations")
        .arg("--session-file")
        .arg(&session)
        .args(["--api-url", UNREACHABLE_API])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Unable to reach the server"))
        .stderr(predicates::str::contains("failed to load conversations"));
}

#[test]
fn test_whoami_prints_stored_user() {
    let dir = TempDir::new().unwrap();
    let session = write_session(&dir);
    parlor(&dir)
        .args(["session", "whoami", "--session-file"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicates::str::contains("user #7"))
        .stdout(predicates::str::contains("asmith"));
}

#[test]
fn test_logout_removes_session_once() {
    let dir = TempDir::new().unwrap();
    let session = write_session(&dir);
    parlor(&dir)
        .args(["session", "logout", "--session-file"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicates::str::contains("Removed session"));
    assert!(!session.exists());

    parlor(&dir)
        .args(["session", "logout", "--session-file"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicates::str::contains("No active session"));
}

#[test]
fn test_login_rejects_blank_login_offline() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("session.json");
    parlor(&dir)
        .args(["session", "login", "--login", "   ", "--session-file"])
        .arg(&session)
        .args(["--api-url", UNREACHABLE_API])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Please enter your login"))
        .stderr(predicates::str::contains("Unable to reach").not());
    assert!(!session.exists());
}

#[test]
fn test_send_requires_a_target() {
    let dir = TempDir::new().unwrap();
    parlor(&dir)
        .args(["send", "hello"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--to"));
}

#[test]
fn test_open_rejects_malformed_conversation_id() {
    let dir = TempDir::new().unwrap();
    parlor(&dir)
        .args(["open", "not-an-id"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value"));
}
