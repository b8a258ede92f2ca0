#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn tenantops() -> Command {
    let mut cmd = Command::cargo_bin("tenantops").unwrap();
    cmd.env_remove("OS_NOVA_URL")
        .env_remove("TENANTOPS_HTTP_TIMEOUT")
        .env_remove("TENANTOPS_QUOTA_DEFAULTS");
    cmd
}

#[test]
fn test_cli_help() {
    tenantops()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("project"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_project_help_lists_commands() {
    tenantops()
        .args(["project", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ensure"))
        .stdout(predicate::str::contains("apply-quota-all"))
        .stdout(predicate::str::contains("get-quota"))
        .stdout(predicate::str::contains("ensure-ldap"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn test_cli_version() {
    tenantops()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("tenantops "));
}

#[test]
fn test_quota_commands_require_nova_url() {
    tenantops()
        .args(["project", "get-quota", "--project-name", "alpha"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains(
            "OS_NOVA_URL environment variable must be set",
        ));

    tenantops()
        .args([
            "project",
            "apply-quota-all",
            "--quota-name",
            "instances",
            "--quota-value",
            "10",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OS_NOVA_URL"));
}

#[test]
fn test_quota_name_conflicts_with_defaults() {
    tenantops()
        .args([
            "project",
            "apply-quota",
            "--project-name",
            "alpha",
            "--quota-name",
            "instances",
            "--quota-value",
            "10",
            "--defaults",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_quota_name_requires_value() {
    tenantops()
        .args(["project", "apply-quota-all", "--quota-name", "instances"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--quota-value"));
}

#[test]
fn test_quota_arguments_are_required() {
    tenantops()
        .args(["project", "apply-quota-all"])
        .assert()
        .failure();
}

#[test]
fn test_unknown_quota_kind_fails_before_connecting() {
    tenantops()
        .env("OS_NOVA_URL", "http://127.0.0.1:9/v2.1")
        .args([
            "project",
            "apply-quota-all",
            "--quota-name",
            "bogus",
            "--quota-value",
            "-1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"))
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn test_invalid_defaults_file_fails_before_connecting() {
    let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    writeln!(file, "[DEFAULT]\ninstances = many\ncores = -5").unwrap();

    tenantops()
        .env("OS_NOVA_URL", "http://127.0.0.1:9/v2.1")
        .env("TENANTOPS_QUOTA_DEFAULTS", file.path())
        .args(["project", "apply-quota-all", "--defaults"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an integer"))
        .stderr(predicate::str::contains("cores"));
}

#[test]
fn test_unreadable_defaults_file_reported_once() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "instances = = 20").unwrap();

    let output = tenantops()
        .env("OS_NOVA_URL", "http://127.0.0.1:9/v2.1")
        .env("TENANTOPS_QUOTA_DEFAULTS", file.path())
        .args(["project", "apply-quota-all", "--defaults"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("Failed to load").count(), 1, "{stderr}");
}

#[test]
fn test_delete_requires_a_name() {
    tenantops().args(["project", "delete"]).assert().failure();
}

#[test]
fn test_invalid_command() {
    tenantops().arg("invalid-command").assert().failure();
}
