//! CLI integration tests for footprint admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use footprint::store::{SqliteStore, Store};
use footprint::types::Role;
use predicates::prelude::*;

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("footprint").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["admin", "init", "--data-dir", &self.data_dir_str()])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("footprint.db")).expect("open store")
    }
}

#[test]
fn test_init_creates_admin_and_token() {
    let ctx = TestContext::new();
    ctx.init()
        .success()
        .stdout(predicate::str::contains("Admin account created"))
        .stdout(predicate::str::contains("admin@footprint.local"));

    let token = ctx.temp_dir.child(".admin_token");
    token.assert(predicate::str::starts_with("fp_"));
    ctx.temp_dir.child("footprint.db").assert(predicate::path::exists());

    let store = ctx.store();
    assert!(store.has_admin_user().unwrap());
    let admin = store
        .get_user_by_email("admin@footprint.local")
        .unwrap()
        .expect("admin user");
    assert_eq!(admin.role, Role::Admin);
    assert!(store.get_profile_by_user(admin.id).unwrap().is_some());
}

#[test]
fn test_init_with_custom_email() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--email",
            "Ops@Example.org",
        ])
        .assert()
        .success();

    let store = ctx.store();
    assert!(store.get_user_by_email("ops@example.org").unwrap().is_some());
}

#[test]
fn test_init_twice_fails() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_serve_requires_init() {
    let ctx = TestContext::new();
    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Server not initialized"));
}

#[test]
fn test_serve_rejects_bad_config_file() {
    let ctx = TestContext::new();
    ctx.init().success();
    let config = ctx.temp_dir.child("footprint.toml");
    config.write_str("[auth]\nsession_ttl_hours = \"soon\"\n").unwrap();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session_ttl_hours"));
}
