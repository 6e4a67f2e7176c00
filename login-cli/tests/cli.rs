//! End-to-end tests of the `loginstore` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Env {
    dir: TempDir,
    config: PathBuf,
}

impl Env {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let config = dir.path().join("store.toml");
        std::fs::write(&config, "[kdf]\nmemory_mib = 1\niterations = 1\nparallelism = 1\n")
            .unwrap();
        Self { dir, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self, db: &str, key: &str) -> Command {
        let mut cmd = Command::cargo_bin("loginstore").unwrap();
        cmd.env_remove("LOGINSTORE_KEY")
            .arg("--db")
            .arg(self.path(db))
            .arg("--config")
            .arg(&self.config)
            .arg("--key")
            .arg(key);
        cmd
    }

    fn add(&self, db: &str, guid: &str, host: &str) {
        self.cmd(db, "k")
            .args(["add", host, "-u", "alice", "-p", "s3cret", "--guid", guid])
            .arg("--form-url")
            .arg(format!("{}/login", host))
            .assert()
            .success()
            .stdout(predicate::str::contains(guid));
    }
}

fn sync(env: &Env, db: &str, remote: &Path) -> assert_cmd::assert::Assert {
    env.cmd(db, "k")
        .arg("sync")
        .arg("--remote")
        .arg(remote)
        .args(["--token", "t"])
        .assert()
}

#[test]
fn add_get_list() {
    let env = Env::new();
    env.add("a.db", "g1", "https://example.com");

    env.cmd("a.db", "k")
        .args(["get", "g1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hostname\": \"https://example.com\""));

    env.cmd("a.db", "k")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("g1"))
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn wrong_key_is_rejected() {
    let env = Env::new();
    env.add("a.db", "g1", "https://example.com");

    env.cmd("a.db", "other")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Wrong key"));
}

#[test]
fn invalid_login_is_rejected() {
    let env = Env::new();

    env.cmd("a.db", "k")
        .args(["add", "https://example.com", "-p", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn form_url_conflicts_with_realm() {
    let env = Env::new();

    env.cmd("a.db", "k")
        .args(["add", "https://example.com", "-p", "pw"])
        .args(["--form-url", "https://example.com/login", "--realm", "R"])
        .assert()
        .failure();
}

#[test]
fn delete_then_status() {
    let env = Env::new();
    env.add("a.db", "g1", "https://example.com");

    env.cmd("a.db", "k")
        .args(["delete", "g1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted g1"));

    env.cmd("a.db", "k")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logins:   0"))
        .stdout(predicate::str::contains("never synced"));
}

#[test]
fn two_databases_sync_through_remote_file() {
    let env = Env::new();
    let remote = env.path("remote.json");
    env.add("laptop.db", "g1", "https://a.com");
    env.add("phone.db", "g2", "https://b.com");

    sync(&env, "laptop.db", &remote)
        .success()
        .stdout(predicate::str::contains("Uploaded: 1"));
    sync(&env, "phone.db", &remote)
        .success()
        .stdout(predicate::str::contains("Applied:  1"))
        .stdout(predicate::str::contains("Uploaded: 1"));
    sync(&env, "laptop.db", &remote).success();

    for db in ["laptop.db", "phone.db"] {
        env.cmd(db, "k")
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("g1"))
            .stdout(predicate::str::contains("g2"));
    }
}

#[test]
fn rekey_switches_keys() {
    let env = Env::new();
    env.add("a.db", "g1", "https://example.com");

    env.cmd("a.db", "k")
        .args(["rekey", "--new-key", "k2"])
        .assert()
        .success();

    env.cmd("a.db", "k2")
        .args(["get", "g1"])
        .assert()
        .success();
    env.cmd("a.db", "k").arg("list").assert().failure();
}
