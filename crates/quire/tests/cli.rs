//! End-to-end tests of the quire binary against real git repositories

use std::path::Path;

use assert_cmd::Command;
use git2::Repository;
use predicates::prelude::*;
use tempfile::TempDir;

fn quire(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quire").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    Repository::init(dir.path()).unwrap();
    dir
}

/// A bare remote and two clones pointing at it as `origin`
fn two_clones() -> (TempDir, TempDir, TempDir) {
    let remote = TempDir::new().unwrap();
    Repository::init_bare(remote.path()).unwrap();
    let url = remote.path().to_str().unwrap();

    let a = init_repo();
    Repository::open(a.path()).unwrap().remote("origin", url).unwrap();
    let b = init_repo();
    Repository::open(b.path()).unwrap().remote("origin", url).unwrap();
    (remote, a, b)
}

fn create_user(dir: &Path, name: &str) -> String {
    let output = quire(dir)
        .args(["--json", "user", "create", "--name", name, "--email", "me@example.com"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    json["data"]["id"].as_str().unwrap().to_string()
}

#[test]
fn outside_a_repository_is_not_found() {
    let dir = TempDir::new().unwrap();
    quire(dir.path())
        .args(["user", "ls"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Not a git repository"));
}

#[test]
fn create_list_and_show() {
    let dir = init_repo();
    quire(dir.path())
        .args(["user", "create", "--name", "Alice", "--login", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created identity"));

    quire(dir.path())
        .args(["user", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* ").and(predicate::str::contains("Alice (alice)")));

    quire(dir.path())
        .args(["--json", "user", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"ok\": true")
                .and(predicate::str::contains("\"name\": \"Alice\""))
                .and(predicate::str::contains("\"adopted\": true")),
        );
}

#[test]
fn show_without_adopted_identity() {
    let dir = init_repo();
    quire(dir.path())
        .args(["user", "show"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("quire user create"));
}

#[test]
fn edits_append_versions_only_on_change() {
    let dir = init_repo();
    let id = create_user(dir.path(), "Alice");

    quire(dir.path())
        .args(["user", "edit", "--name", "Alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing changed"));

    quire(dir.path())
        .args(["user", "edit", &id[..10], "--name", "Alice B", "--generate-key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated identity"));

    quire(dir.path())
        .args(["--json", "user", "show", &id])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"versions\": 2")
                .and(predicate::str::contains("\"name\": \"Alice B\"")),
        );
}

#[test]
fn adopt_rejects_unknown_identity() {
    let dir = init_repo();
    quire(dir.path())
        .args(["user", "adopt", "abcdef"])
        .assert()
        .code(3);
}

#[test]
fn push_pull_roundtrip_and_divergence() {
    let (_remote, a, b) = two_clones();
    let id = create_user(a.path(), "Alice");

    quire(a.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local-only"));

    quire(a.path())
        .args(["push"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pushed"));

    quire(b.path())
        .args(["pull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new").and(predicate::str::contains("Alice")));

    // nothing new the second time
    quire(b.path())
        .args(["pull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));

    // a fast-forward from A
    quire(a.path())
        .args(["user", "edit", "--name", "Alice A"])
        .assert()
        .success();
    quire(a.path()).args(["push"]).assert().success();
    quire(b.path())
        .args(["pull"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updated").and(predicate::str::contains("Alice A")));

    // concurrent edits on both sides
    quire(a.path())
        .args(["user", "edit", "--name", "from A"])
        .assert()
        .success();
    quire(b.path())
        .args(["user", "edit", &id, "--name", "from B"])
        .assert()
        .success();
    quire(a.path()).args(["push"]).assert().success();

    quire(b.path())
        .args(["push"])
        .assert()
        .failure();

    quire(b.path())
        .args(["pull"])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("invalid"))
        .stderr(predicate::str::contains("could not be merged"));

    quire(b.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("diverged"));

    // B keeps its own edit
    quire(b.path())
        .args(["--json", "user", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"from B\""));
}

#[test]
fn json_errors_use_the_envelope() {
    let dir = init_repo();
    quire(dir.path())
        .args(["--json", "pull", "nowhere"])
        .assert()
        .code(3)
        .stderr(
            predicate::str::contains("\"ok\": false")
                .and(predicate::str::contains("\"code\": \"not_found\"")),
        );
}
