//! CLI integration tests for the Tollgate command-line interface.
//!
//! Every test points the config directory and database at a temp dir so
//! nothing touches the user's real configuration or log directory.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use tollgate_input::{ExecutionInputInstance, InputInstanceStorage, SqliteInputStore};

/// Get a command for the tollgate binary, isolated in `dir`.
fn tollgate(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tollgate").unwrap();
    cmd.current_dir(dir)
        .env("TOLLGATE_CONFIG_DIR", dir.join("config"))
        .env("TOLLGATE_DB", dir.join("inputs.db"))
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("instances"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tollgate"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path()).arg("frobnicate").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_merge_prints_merged_json() {
    let dir = tempfile::tempdir().unwrap();
    let template = write(
        &dir,
        "template.yaml",
        "script: <+input>.executionInput()\nretries: <+input>.default(3).executionInput()\n",
    );
    let input = write(&dir, "input.yaml", "script: echo Hi\n");

    tollgate(dir.path())
        .args(["--json", "merge", "--template"])
        .arg(&template)
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""script":"echo Hi""#))
        .stdout(predicate::str::contains(r#""retries":3"#));
}

#[test]
fn test_merge_reports_unfilled_fields() {
    let dir = tempfile::tempdir().unwrap();
    let template = write(&dir, "template.yaml", "a:\n  b: <+input>.executionInput()\n");

    tollgate(dir.path())
        .arg("merge")
        .arg("--template")
        .arg(&template)
        .assert()
        .success()
        .stderr(predicate::str::contains("a.b"));
}

#[test]
fn test_merge_rejects_disallowed_value() {
    let dir = tempfile::tempdir().unwrap();
    let template = write(
        &dir,
        "template.yaml",
        "env: <+input>.allowedValues(dev,prod).executionInput()\n",
    );
    let input = write(&dir, "input.yaml", "env: qa\n");

    tollgate(dir.path())
        .arg("merge")
        .arg("--template")
        .arg(&template)
        .arg("--input")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("allowed values"));
}

#[test]
fn test_merge_malformed_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let template = write(&dir, "template.yaml", "a: [oops\n");

    tollgate(dir.path())
        .arg("merge")
        .arg("--template")
        .arg(&template)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid YAML"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Check
// ─────────────────────────────────────────────────────────────────────────────

const FIELD_YAML: &str = r#"
pipeline:
  variables:
    - name: var1
      type: Number
      value: <+input>.default(1234).executionInput()
      required: true
"#;

#[test]
fn test_check_partial_allows_default() {
    let dir = tempfile::tempdir().unwrap();
    let fields = write(&dir, "fields.yaml", FIELD_YAML);

    tollgate(dir.path())
        .arg("check")
        .arg("--field-yaml")
        .arg(&fields)
        .arg("--partial")
        .assert()
        .success()
        .stdout(predicate::str::contains("All required variables provided"));
}

#[test]
fn test_check_strict_requires_value() {
    let dir = tempfile::tempdir().unwrap();
    let fields = write(&dir, "fields.yaml", FIELD_YAML);

    tollgate(dir.path())
        .arg("check")
        .arg("--field-yaml")
        .arg(&fields)
        .assert()
        .failure()
        .stderr(predicate::str::contains("var1"))
        .stderr(predicate::str::contains("default value"));
}

#[test]
fn test_check_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let fields = write(&dir, "fields.yaml", FIELD_YAML);
    let input = write(
        &dir,
        "input.yaml",
        "pipeline:\n  variables:\n    - name: var1\n      value: 7\n",
    );

    tollgate(dir.path())
        .args(["--json", "check", "--field-yaml"])
        .arg(&fields)
        .arg("--input")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""ok": true"#));
}

// ─────────────────────────────────────────────────────────────────────────────
// Instances
// ─────────────────────────────────────────────────────────────────────────────

fn seed(dir: &TempDir) {
    let store = SqliteInputStore::open(&dir.path().join("inputs.db")).unwrap();
    store
        .save(&ExecutionInputInstance::with_id(
            "instance-1",
            "node-1",
            "script: <+input>.executionInput()\n",
            "",
        ))
        .unwrap();
    store
        .save(&ExecutionInputInstance::with_id(
            "instance-2",
            "node-2",
            "env: <+input>.executionInput()\n",
            "",
        ))
        .unwrap();
}

#[test]
fn test_instances_list_empty() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .args(["instances", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No execution input instances found"));
}

#[test]
fn test_instances_get_and_template() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir);

    tollgate(dir.path())
        .args(["--json", "instances", "get", "node-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("instance-1"))
        .stdout(predicate::str::contains(r#""state": "pending""#));

    tollgate(dir.path())
        .args(["instances", "template", "node-2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("env: <+input>.executionInput()"));
}

#[test]
fn test_instances_list_and_purge() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir);

    tollgate(dir.path())
        .args(["instances", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("node-1"))
        .stdout(predicate::str::contains("node-2"));

    tollgate(dir.path())
        .args(["instances", "purge", "node-1", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 instance(s)"));

    tollgate(dir.path())
        .args(["instances", "get", "node-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No execution input"));
}

#[test]
fn test_instances_purge_requires_ids() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .args(["instances", "purge"])
        .assert()
        .failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_env_dir() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_project_layer() {
    let dir = tempfile::tempdir().unwrap();
    write(
        &dir,
        "tollgate.toml",
        "[wait]\ndefault_timeout_secs = 60\nmax_retries = 5\n",
    );

    tollgate(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tollgate.toml"))
        .stdout(predicate::str::contains("60s"))
        .stdout(predicate::str::contains("max retries:        5"));
}

#[test]
fn test_config_init_writes_defaults_once() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"));

    let written = std::fs::read_to_string(dir.path().join("config").join("config.toml")).unwrap();
    assert!(written.contains("default_timeout_secs = 86400"));

    tollgate(dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_init_local_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    tollgate(dir.path())
        .args(["config", "init", "--local"])
        .assert()
        .success();
    assert!(dir.path().join("tollgate.toml").exists());

    tollgate(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tollgate.toml"))
        .stdout(predicate::str::contains("86400s"));
}
