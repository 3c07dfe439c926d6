//! Integration tests for the offline commands

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command isolated from the user's config and keys
fn chainkit_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chainkit").unwrap();
    cmd.env("CHAINKIT_CONFIG", home.path().join("config.yml"))
        .env_remove("JUDGE0_API_KEY")
        .env_remove("CHAINKIT_LLM_API_KEY")
        .env_remove("CHAINKIT_STORE");
    cmd
}

#[test]
fn test_models_json() {
    let home = TempDir::new().unwrap();
    let output = chainkit_cmd(&home)
        .args(["models", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(rows
        .iter()
        .any(|r| r["name"] == "mistral-small-latest" && r["kind"] == "chat"));
    assert!(rows
        .iter()
        .any(|r| r["name"] == "mistral-embed" && r["detail"] == "1024 dims"));
    assert!(rows
        .iter()
        .any(|r| r["name"] == "javascript" && r["detail"] == "id 93"));
}

#[test]
fn test_models_csv_for_one_provider() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["models", "--provider", "judge0", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("provider,kind,name,detail\n"))
        .stdout(predicate::str::contains("judge0,language,javascript,id 93"))
        .stdout(predicate::str::contains("judge0,language,python,id 71"))
        .stdout(predicate::str::contains("mistral").not());
}

#[test]
fn test_filter_json() {
    let home = TempDir::new().unwrap();
    let output = chainkit_cmd(&home)
        .args([
            "filter",
            "genre = 'fiction' AND year >= 2000",
            "-m",
            "genre=fiction",
            "-m",
            "year=2005",
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["filter"]["op"], "and");
    assert_eq!(value["filter"]["left"]["key"], "genre");
    assert_eq!(value["matches"], true);
}

#[test]
fn test_filter_text_output() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["filter", "year < 2000", "-m", "year=2005"])
        .assert()
        .success()
        .stdout(predicate::str::contains("matches: false"));
}

#[test]
fn test_filter_parse_error_exit_code() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["filter", "name = "])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_filter_type_mismatch_exit_code() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["filter", "year > 2000", "-m", "year=unknown"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Type mismatch"));
}

#[test]
fn test_exec_requires_judge0_key() {
    let home = TempDir::new().unwrap();
    let script = home.path().join("sum.js");
    std::fs::write(&script, "console.log(1 + 1)").unwrap();

    chainkit_cmd(&home)
        .arg("exec")
        .arg(&script)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Judge0 API key missing"));
}

#[test]
fn test_chat_rejects_unknown_mistral_model() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .env("CHAINKIT_LLM_API_KEY", "not-used")
        .args(["chat", "hello", "--provider", "mistral", "--model", "mistral-huge"])
        .assert()
        .code(2);
}
