//! Smoke tests to verify command module wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn pms() -> Command {
    let mut cmd = Command::cargo_bin("pms").unwrap();
    // Keep user config and .env files out of the tests.
    cmd.env("HOME", env!("CARGO_TARGET_TMPDIR"))
        .env_remove("DATABASE_URL")
        .env_remove("PMS_DATABASE_URL");
    cmd
}

#[test]
fn test_top_level_help() {
    pms()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("completions"));
}

// === Serve Command Tests ===

#[test]
fn test_serve_help() {
    pms()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Allow permissive CORS"))
        .stdout(predicate::str::contains("--attachments-dir"));
}

#[test]
fn test_serve_rejects_bad_bind() {
    pms()
        .args(["serve", "--bind", "not-an-address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

// === User Command Tests ===

#[test]
fn test_user_create_help() {
    pms()
        .args(["user", "create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Global role"));
}

#[test]
fn test_user_create_rejects_unknown_role() {
    pms()
        .args(["user", "create", "--email", "a@b.test", "--role", "wizard"])
        .assert()
        .failure();
}

#[test]
fn test_user_create_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("pms.db").display());

    pms()
        .args(["user", "create", "--email", "pmo@acme.test", "--role", "pmo"])
        .args(["--database-url", &url])
        .env("PMS_USER_PASSWORD", "correct horse battery")
        .assert()
        .success()
        .stdout(predicate::str::contains("with role pmo"));

    pms()
        .args(["user", "list", "--database-url", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains("pmo@acme.test"));

    pms()
        .args(["user", "create", "--email", "PMO@acme.test"])
        .args(["--database-url", &url])
        .env("PMS_USER_PASSWORD", "correct horse battery")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// === Migrate Command Tests ===

#[test]
fn test_migrate_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("pms.db");

    pms()
        .args(["migrate", "--database-url"])
        .arg(format!("sqlite://{}", db_path.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    assert!(db_path.exists());
}

// === Config Command Tests ===

#[test]
fn test_config_show_prints_defaults() {
    pms()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[server]"))
        .stdout(predicate::str::contains("127.0.0.1:3030"));
}

#[test]
fn test_config_path() {
    pms()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("pms.toml"));
}

// === Completions Tests ===

#[test]
fn test_completions_bash() {
    pms()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pms"));
}
