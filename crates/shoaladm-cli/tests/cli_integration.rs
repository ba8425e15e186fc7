//! CLI subprocess integration tests.
//!
//! These tests invoke the `shoaladm` binary as a subprocess and verify
//! exit codes, stdout content, and validation behavior. Commands that
//! would reach a real container engine or systemd are not exercised here;
//! `SHOALADM_ENGINE` bypasses engine discovery so validation paths run
//! everywhere.

use std::process::Command;

fn shoaladm_bin(store: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shoaladm"));
    cmd.env("SHOALADM_ENGINE", "/bin/true");
    cmd.args([
        "--data-dir",
        &store.join("data").to_string_lossy(),
        "--log-dir",
        &store.join("log").to_string_lossy(),
        "--unit-dir",
        &store.join("units").to_string_lossy(),
    ]);
    cmd
}

fn temp_store() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

#[test]
fn cli_version_flag_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_shoaladm"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success(), "shoaladm --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shoaladm"));
}

#[test]
fn cli_help_lists_lifecycle_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_shoaladm"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["bootstrap", "deploy", "adopt", "rm-daemon", "rm-cluster", "ls"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn ls_on_an_empty_store_reports_nothing() {
    let store = temp_store();
    let output = shoaladm_bin(store.path()).arg("ls").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("no daemons found"));
}

#[test]
fn ls_json_on_an_empty_store_is_an_empty_array() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args(["--json", "ls"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[test]
fn rm_daemon_without_force_is_a_validation_error() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args([
            "rm-daemon",
            "mon.a",
            "--fsid",
            "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--force"), "must name the missing flag: {stderr}");
    // Nothing was created along the way.
    assert!(!store.path().join("data").exists());
}

#[test]
fn rm_cluster_without_force_is_a_validation_error() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args(["rm-cluster", "--fsid", "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn rm_cluster_rejects_a_malformed_fsid() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args(["rm-cluster", "--fsid", "not-a-uuid", "--force"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not-a-uuid"));
}

#[test]
fn deploy_rejects_an_unknown_daemon_kind() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args([
            "deploy",
            "floppy.a",
            "--image",
            "img",
            "--fsid",
            "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("floppy"));
}

#[test]
fn deploy_without_a_config_source_fails_cleanly() {
    let store = temp_store();
    let output = shoaladm_bin(store.path())
        .args([
            "deploy",
            "mds.a",
            "--image",
            "img",
            "--fsid",
            "2d5a7f4e-8c1b-4a61-9f2e-3b7c0d8e1a90",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--config"));
    assert!(!store.path().join("data").exists());
}

#[test]
fn completions_generate_for_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_shoaladm"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("shoaladm"));
}
