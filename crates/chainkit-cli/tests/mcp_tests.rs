//! `chainkit mcp` talking to `chainkit mcp serve` over stdio

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn chainkit_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("chainkit").unwrap();
    cmd.env("CHAINKIT_CONFIG", home.path().join("config.yml"))
        .env_remove("JUDGE0_API_KEY");
    cmd
}

fn server_command() -> Vec<String> {
    vec![
        cargo_bin("chainkit").to_string_lossy().into_owned(),
        "mcp".to_string(),
        "serve".to_string(),
    ]
}

#[test]
fn test_list_tools_of_local_server() {
    let home = TempDir::new().unwrap();
    let output = chainkit_cmd(&home)
        .args(["mcp", "tools", "--format", "json", "--"])
        .args(server_command())
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let tools: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    // Without a Judge0 key only the model listing is offered
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "list_models");
}

#[test]
fn test_call_tool() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["mcp", "call", "list_models", "--"])
        .args(server_command())
        .assert()
        .success()
        .stdout(predicate::str::contains("mistral-large-latest"))
        .stdout(predicate::str::contains("python (71)"));
}

#[test]
fn test_call_unknown_tool() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["mcp", "call", "execute_javascript", "--args", r#"{"code":"1"}"#, "--"])
        .args(server_command())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "There was an error executing the tool. Message: Invalid tool name: execute_javascript. Code: -32601",
        ));
}

#[test]
fn test_configured_server() {
    let home = TempDir::new().unwrap();
    let command = server_command()
        .iter()
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join(", ");
    std::fs::write(
        home.path().join("config.yml"),
        format!("mcp_servers:\n  local:\n    command: [{}]\n", command),
    )
    .unwrap();

    chainkit_cmd(&home)
        .args(["mcp", "tools", "--server", "local", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("name,description\n"))
        .stdout(predicate::str::contains("list_models,"));

    chainkit_cmd(&home)
        .args(["mcp", "tools", "--server", "missing"])
        .assert()
        .code(3);
}

#[test]
fn test_requires_a_target() {
    let home = TempDir::new().unwrap();
    chainkit_cmd(&home)
        .args(["mcp", "tools"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--server"));
}
