//! End-to-end tests driving the `mh` binary.
//!
//! Each test points the binary at a fresh database through `MH_DATABASE_PATH`
//! and a temporary `HOME`, so no user configuration leaks in.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::{Value, json};
use tempfile::TempDir;

fn mh_binary() -> String {
    env!("CARGO_BIN_EXE_mh").to_string()
}

/// Runs `mh` with `args`, feeding `stdin` as the request body.
fn run(home: &Path, args: &[&str], stdin: &Value) -> Output {
    let mut child = Command::new(mh_binary())
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("MH_DATABASE_PATH", home.join("data/mh.db"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn mh");
    // The binary may exit without reading stdin when `--input` is given.
    let _ = child
        .stdin
        .take()
        .expect("stdin")
        .write_all(stdin.to_string().as_bytes());
    child.wait_with_output().expect("wait for mh")
}

fn run_ok(home: &Path, args: &[&str], stdin: &Value) -> Value {
    let output = run(home, args, stdin);
    assert!(
        output.status.success(),
        "mh {args:?} should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    if output.stdout.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn key(id: &str) -> Value {
    json!({"username": "alice", "media_type": "vn", "media_identifier": id})
}

#[test]
fn test_backfill_put_then_get() {
    let temp = TempDir::new().unwrap();
    let history = json!({
        "username": "alice",
        "media_entries": [
            {"key": key("novel"), "display_name": "A Novel", "series": "", "last_update": 50},
            {"key": {"username": "bob", "media_type": "vn", "media_identifier": "x"},
             "display_name": "Not mine", "series": "", "last_update": 50}
        ],
        "media_stats": [
            {"key": key("novel"), "date": 86400,
             "stats": {"time_read": 60, "chars_read": 10, "lines_read": 1},
             "last_update": 90000, "pause": false}
        ]
    });

    let leftover = run_ok(temp.path(), &["backfill", "put"], &history);
    assert_eq!(leftover["write_requests"], json!([]));

    let exported = run_ok(
        temp.path(),
        &["backfill", "get"],
        &json!({"key": key(""), "datetime": 0}),
    );
    assert_eq!(exported["username"], "alice");
    assert_eq!(exported["media_entries"].as_array().unwrap().len(), 1);
    assert_eq!(exported["media_stats"][0]["stats"]["time_read"], 60);
}

#[test]
fn test_status_put_get_delete() {
    let temp = TempDir::new().unwrap();
    // 2024-03-15T07:00:00Z
    let start = 1_710_486_000_i64;
    let update = json!({
        "key": key("novel"),
        "stats": {"chars_read": 25, "lines_read": 2},
        "progress": [
            {"datetime": start},
            {"datetime": start + 30},
            {"datetime": start + 50, "status_change": true}
        ],
        "timezone": "UTC"
    });

    let written = run_ok(temp.path(), &["status", "put"], &update);
    assert_eq!(written["stats"]["time_read"], 50);
    assert_eq!(written["date"], 1_710_460_800_i64);

    let date_key = json!({"key": key("novel"), "datetime": 1_710_460_800_i64});
    let read = run_ok(temp.path(), &["status", "get"], &date_key);
    assert_eq!(read, written);

    run_ok(temp.path(), &["status", "delete"], &date_key);
    let missing = run(temp.path(), &["status", "get"], &date_key);
    assert!(!missing.status.success());
}

#[test]
fn test_media_put_reads_request_file() {
    let temp = TempDir::new().unwrap();
    let request = temp.path().join("entry.json");
    std::fs::write(
        &request,
        json!({"key": key("novel"), "display_name": "A Novel", "series": "Saga"}).to_string(),
    )
    .unwrap();

    let written = run_ok(
        temp.path(),
        &["media", "put", "--input", request.to_str().unwrap()],
        &Value::Null,
    );
    assert_eq!(written["series"], "Saga");

    let read = run_ok(temp.path(), &["media", "get"], &key("novel"));
    assert_eq!(read, written);
}

#[test]
fn test_invalid_requests_fail() {
    let temp = TempDir::new().unwrap();

    let output = run(
        temp.path(),
        &["backfill", "put"],
        &json!({"username": "", "media_entries": [], "media_stats": []}),
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid username"));

    let output = run(temp.path(), &["media", "get"], &json!("not a key"));
    assert!(!output.status.success());
}

#[test]
fn test_batch_write_resubmission() {
    let temp = TempDir::new().unwrap();
    let requests: Vec<Value> = (0..30)
        .map(|i| json!({"put": {"pk": "vn#alice", "sk": format!("n{i}"), "last_update": i}}))
        .collect();
    let leftover = run_ok(
        temp.path(),
        &["batch-write"],
        &json!({"table_name": "media", "write_requests": requests, "max_batch_size": 0}),
    );
    assert_eq!(leftover["write_requests"], json!([]));
    assert_eq!(leftover["max_batch_size"], 25);
}
