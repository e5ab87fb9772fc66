//! Integration tests for the `vigil` CLI binary.
//!
//! Argument parsing, help, completions, config handling, and a couple of
//! HTTP round trips against a mock gateway.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// `vigil` with every `VIGIL_*` variable cleared and the config
/// directory pointed at `home`.
fn vigil_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("VIGIL_PROFILE")
        .env_remove("VIGIL_GATEWAY")
        .env_remove("VIGIL_NODE")
        .env_remove("VIGIL_TOKEN")
        .env_remove("VIGIL_OUTPUT")
        .env_remove("VIGIL_INSECURE")
        .env_remove("RUST_LOG");
    cmd
}

fn isolated() -> (tempfile::TempDir, assert_cmd::Command) {
    let dir = tempfile::tempdir().unwrap();
    let cmd = vigil_cmd(dir.path());
    (dir, cmd)
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let (_dir, mut cmd) = isolated();
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "expected usage in:\n{stderr}");
}

#[test]
fn help_lists_commands() {
    let (_dir, mut cmd) = isolated();
    cmd.arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("sensors"))
            .and(predicate::str::contains("cameras"))
            .and(predicate::str::contains("digest"))
            .and(predicate::str::contains("nodes")),
    );
}

#[test]
fn version_flag() {
    let (_dir, mut cmd) = isolated();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}

#[test]
fn completions_bash() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn unknown_output_format_is_rejected() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["--output", "table", "sensors", "load"])
        .assert()
        .code(2);
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn missing_gateway_is_a_usage_error() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["sensors", "load"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No gateway configured"));
}

#[test]
fn unknown_profile_is_reported() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["--profile", "nope", "digest", "run"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn config_path_points_into_config_dir() {
    let (dir, mut cmd) = isolated();
    let expected = dir.path().join("vigil").join("config.toml");
    cmd.args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

#[test]
fn config_show_masks_tokens() {
    let (dir, mut cmd) = isolated();
    let config_dir = dir.path().join("vigil");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[profiles.lab]\ngateway = \"https://gw.example.net\"\ntoken = \"hunter2\"\n",
    )
    .unwrap();

    cmd.args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("****").and(predicate::str::contains("hunter2").not()));
}

// ── Gateway round trips ─────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sensors_load_prints_merged_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/node-a/api/public/sensors"))
        .and(query_param("region", "RU-MOW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "name": "t-1"},
            {"id": 2, "name": "t-2"},
            {"id": 1, "name": "t-1b"}
        ])))
        .mount(&server)
        .await;

    let (_dir, mut cmd) = isolated();
    let assert = cmd
        .args(["--gateway", &server.uri(), "-o", "json-compact", "sensors", "load"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let out: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(out["added"], 2);
    assert_eq!(out["updated"], 1);
    assert_eq!(out["items"].as_array().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_action_falls_back_to_http_without_realtime() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/node-a/api/admin/camera/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queued": 4})))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, mut cmd) = isolated();
    let assert = cmd
        .args(["--gateway", &server.uri(), "-o", "json-compact", "cameras", "scan"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let out: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(out["via"], "http");
    assert_eq!(out["data"]["queued"], 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nodes_status_reports_each_requested_node() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/node-b/api/public/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nodeId": "node-b", "ip": "10.0.0.2", "status": "OK"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/node-b/api/public/peers/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (_dir, mut cmd) = isolated();
    let assert = cmd
        .args(["--gateway", &server.uri(), "-o", "json-compact"])
        .args(["nodes", "--nodes", "node-b,node-a", "status"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let out: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(out[0]["nodeId"], "node-a");
    assert_eq!(out[0]["status"], "DOWN");
    assert_eq!(out[0]["online"], false);
    assert_eq!(out[1]["nodeId"], "node-b");
    assert_eq!(out[1]["status"], "OK");
    assert_eq!(out[1]["ip"], "10.0.0.2");
}

#[test]
fn unreachable_gateway_exits_with_connection_code() {
    let (_dir, mut cmd) = isolated();
    cmd.args(["--gateway", "http://127.0.0.1:9", "sensors", "load"])
        .assert()
        .code(7);
}
