//! Integration tests for CLI commands.

use serde_json::{json, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::TempDir;

const SEED: &str = "0707070707070707070707070707070707070707070707070707070707070707";

fn run_cli(args: &[&str]) -> (bool, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_accord"))
        .args(args)
        .output()
        .expect("Failed to execute CLI");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();
    (output.status.success(), stdout, stderr)
}

fn run_cli_stdin(args: &[&str], input: &str) -> (bool, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_accord"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to execute CLI");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (output.status.success(), String::from_utf8(output.stdout).unwrap())
}

fn write_file(dir: &TempDir, name: &str, value: &Value) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, value.to_string()).unwrap();
    path.to_string_lossy().to_string()
}

fn make_key() -> Value {
    let (success, stdout, _) = run_cli(&["keygen", "--seed", SEED]);
    assert!(success);
    serde_json::from_str(&stdout).unwrap()
}

#[test]
fn test_canonicalize_sorts_keys() {
    let (success, stdout) = run_cli_stdin(&["canonicalize"], r#"{"b": 1, "a": {"d": 2, "c": 3}}"#);
    assert!(success);
    assert_eq!(stdout.trim(), r#"{"a":{"c":3,"d":2},"b":1}"#);
}

#[test]
fn test_canonicalize_rejects_invalid_json() {
    let (success, _, stderr) = {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        run_cli(&["canonicalize", path.to_str().unwrap()])
    };
    assert!(!success);
    assert!(stderr.contains("Invalid JSON"));
}

#[test]
fn test_keygen_is_reproducible_from_seed() {
    let first = make_key();
    let second = make_key();
    assert_eq!(first, second);
    assert_eq!(first["key_id"].as_str().unwrap().len(), 64);
    assert!(first["key_data"].is_string());

    let (success, _, stderr) = run_cli(&["keygen", "--seed", "abcd"]);
    assert!(!success);
    assert!(stderr.contains("32 bytes"));
}

#[test]
fn test_sign_produces_contribution() {
    let temp_dir = TempDir::new().unwrap();
    let key = make_key();
    let proposal = write_file(
        &temp_dir,
        "proposal.json",
        &json!({"meta": {"accept": true}, "body": {"data": {"x": 1}}}),
    );

    let (success, stdout, _) = run_cli(&[
        "sign",
        "--secret",
        key["secret"].as_str().unwrap(),
        &proposal,
    ]);
    assert!(success);
    let contribution: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(
        contribution["text"],
        json!(r#"{"body":{"data":{"x":1}},"meta":{"accept":true}}"#)
    );
    assert_eq!(contribution["signer_key_id"], key["key_id"]);
    assert!(contribution["signature"].is_string());
}

#[test]
fn test_sign_rejects_bad_secret() {
    let (success, _, stderr) = run_cli(&["sign", "--secret", "%%%", "missing.json"]);
    assert!(!success);
    assert!(stderr.contains("Error"));
}

#[test]
fn test_hash_message_and_commit() {
    let (success, stdout, _) = run_cli(&[
        "hash-message",
        "--text",
        "hello",
        "--sender",
        "alice",
        "--recipient",
        "bob",
    ]);
    assert!(success);
    let a = stdout.trim().to_string();
    assert_eq!(a.len(), 64);

    let (_, stdout, _) = run_cli(&["hash-message", "--text", "hi", "--sender", "a", "--recipient", "b"]);
    let b = stdout.trim().to_string();

    let (_, forward, _) = run_cli(&["commit", &a, &b]);
    let (_, reversed, _) = run_cli(&["commit", &b, &a, &b]);
    assert_eq!(forward, reversed);

    let (success, _, stderr) = run_cli(&["commit", "XYZ"]);
    assert!(!success);
    assert!(stderr.contains("Invalid message hash"));
}

#[test]
fn test_consensus_hash_detects_tampering() {
    let temp_dir = TempDir::new().unwrap();
    let mut record = json!({
        "negotiation_id": "negotiation-0001",
        "consensus": "0".repeat(64),
        "text": r#"{"body":{},"meta":{"accept":true}}"#,
        "timestamp": "2024-01-01T12:00:00.000000Z",
        "signings": {"alice": "sig"},
    });

    let path = write_file(&temp_dir, "record.json", &record);
    let (success, stdout, stderr) = run_cli(&["consensus-hash", &path]);
    assert!(!success);
    assert!(stderr.contains("mismatch"));
    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["matches"], json!(false));

    record["consensus"] = report["computed"].clone();
    let path = write_file(&temp_dir, "fixed.json", &record);
    let (success, stdout, _) = run_cli(&["consensus-hash", &path]);
    assert!(success);
    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["matches"], json!(true));
}

#[test]
fn test_invalid_profile_is_rejected() {
    let (success, _, stderr) = run_cli(&["--profile", "short", "commit", &"a".repeat(64)]);
    // commit does not canonicalize, so only canonicalizing commands reject the profile.
    assert!(success, "{stderr}");
    let temp_dir = TempDir::new().unwrap();
    let path = write_file(&temp_dir, "doc.json", &json!({}));
    let (success, _, stderr) = run_cli(&["--profile", "short", "canonicalize", &path]);
    assert!(!success);
    assert!(stderr.contains("Invalid profile ID"));
}
