// file: tests/cli_test.rs
// version: 1.0.0
// guid: 7d1f4b9e-2a63-4c85-b0e7-e5c8a3f6d291

//! Command line smoke tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn kangaroo() -> Command {
    Command::cargo_bin("kangaroo").unwrap()
}

#[test]
fn test_help_lists_subcommands() {
    kangaroo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("add-server"))
        .stdout(predicate::str::contains("delete-server-all"))
        .stdout(predicate::str::contains("bootstrap-command"));
}

#[test]
fn test_connect_to_without_allow_list() {
    let home = TempDir::new().unwrap();

    kangaroo()
        .env("HOME", home.path())
        .args(["connect-to", "web1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("No servers configured."));
}

#[test]
fn test_connect_to_unlisted_target_is_denied() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("servers.yaml"),
        "- name: web1\n  user: kangaroo\n  host: 10.0.0.5\n",
    )
    .unwrap();

    kangaroo()
        .env("HOME", home.path())
        .args(["connect-to", "db"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Access denied."));
}

#[test]
fn test_management_commands_require_root() {
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    kangaroo()
        .arg("users")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Run as root"));
}

#[test]
fn test_head_and_follow_conflict_is_reported() {
    if unsafe { libc::geteuid() } != 0 {
        return;
    }
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("ssh_login.log");
    std::fs::write(&log, "alice 10.0.0.1 login\n").unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!("[paths]\nlogin_log = \"{}\"\n", log.display()),
    )
    .unwrap();

    kangaroo()
        .arg("--config")
        .arg(&config)
        .args(["login-logs", "--head", "--follow"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Cannot use --head and --follow together."));
}
