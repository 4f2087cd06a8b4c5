// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Integration tests for the stateweave CLI commands
//!
//! None of these reach a live backend: they cover offline commands, the
//! paths that finish before any request, a backend nobody listens on, and
//! `--offline` fixtures.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command with an isolated config file and a backend nobody listens on
fn stateweave(dir: &TempDir) -> Command {
    let config = dir.path().join("config.toml");
    if !config.exists() {
        fs::write(
            &config,
            "api_url = \"http://127.0.0.1:9/api\"\ncontainer_ids = [\"C1\", \"C2\"]\n",
        )
        .unwrap();
    }
    let mut cmd = Command::cargo_bin("stateweave").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("STATEWEAVE_API_URL")
        .env_remove("STATEWEAVE_OFFLINE")
        .arg("--config")
        .arg(&config)
        .arg("--no-color");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("metadata"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stateweave"));
}

#[test]
fn test_config_reads_file() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:9/api"))
        .stdout(predicate::str::contains("timeout_secs = 30"));

    stateweave(&dir)
        .args(["config", "container_ids"])
        .assert()
        .success()
        .stdout("C1,C2\n");
}

#[test]
fn test_config_env_and_flag_overrides() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .env("STATEWEAVE_TIMEOUT_SECS", "5")
        .args(["config", "timeout_secs"])
        .assert()
        .success()
        .stdout("5\n");

    stateweave(&dir)
        .args(["--api-url", "http://backend.test/api", "config", "api_url"])
        .assert()
        .success()
        .stdout("http://backend.test/api\n");
}

#[test]
fn test_config_unknown_key_fails() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["config", "colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("stateweave")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_base_state_delete_refused() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["state", "delete", "base"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved"));
}

#[test]
fn test_unknown_state_action() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["state", "rename", "v2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown state action"));
}

#[test]
fn test_apply_empty_diff_is_nothing_to_do() {
    let dir = TempDir::new().unwrap();
    let diff = dir.path().join("diff.json");
    fs::write(&diff, r#"{"C1": {}}"#).unwrap();

    stateweave(&dir)
        .arg("apply")
        .arg(&diff)
        .args(["--target", "v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to apply"));
}

#[test]
fn test_apply_rejects_malformed_diff() {
    let dir = TempDir::new().unwrap();
    let diff = dir.path().join("diff.json");
    fs::write(&diff, r#"{"C1": {"T1": {"status": "teleported"}}}"#).unwrap();

    stateweave(&dir)
        .arg("revert")
        .arg(&diff)
        .args(["--target", "v2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid diff"));
}

#[test]
fn test_metadata_set_needs_a_field() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["metadata", "set", "base", "v2", "C1", "T1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to set"));
}

#[test]
fn test_unreachable_backend_diff_is_empty() {
    let dir = TempDir::new().unwrap();
    stateweave(&dir)
        .args(["diff", "base", "v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No differences"));
}

#[test]
fn test_diff_without_containers_is_nothing_to_compare() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "api_url = \"http://127.0.0.1:9/api\"\n").unwrap();

    stateweave(&dir)
        .args(["diff", "base", "v2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No containers to compare"));
}

fn write_fixture(dir: &TempDir) -> std::path::PathBuf {
    let fixture = dir.path().join("fixture.json");
    fs::write(
        &fixture,
        r#"{
            "states": ["v2"],
            "comparisons": [{
                "sourceState": "base",
                "targetState": "v2",
                "differences": {
                    "C1": { "T1": { "status": "added", "relationship": "supports", "relationship_dict": {} } }
                }
            }],
            "metadata": { "metadata": { "C1|T1|None -> None|add": { "weight": "3", "qual_label": "minor" } } }
        }"#,
    )
    .unwrap();
    fixture
}

#[test]
fn test_offline_compare_uses_fixture() {
    let dir = TempDir::new().unwrap();
    let fixture = write_fixture(&dir);

    stateweave(&dir)
        .arg("--offline")
        .arg(&fixture)
        .args(["compare", "base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base -> v2: +1 (cost 3) [minor]"))
        .stdout(predicate::str::contains("C1 [added] T1 [with] supports (cost: 3 minor)"));
}

#[test]
fn test_offline_diff_apply() {
    let dir = TempDir::new().unwrap();
    let fixture = write_fixture(&dir);

    stateweave(&dir)
        .arg("--offline")
        .arg(&fixture)
        .args(["diff", "base", "v2", "--apply"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] C1-T1"))
        .stdout(predicate::str::contains("Applied 1 changes (v2)"));
}
