//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `canteiro` binary and verify
//! exit codes, stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: create a Command for the `canteiro` binary.
fn canteiro() -> Command {
    cargo_bin_cmd!("canteiro")
}

/// Helper: sqlite URL for a fresh database file under `dir`.
fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("canteiro.db").display())
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    canteiro()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Canteiro construction-site quality-control tracking service",
        ));
}

#[test]
fn version_exits_0() {
    canteiro()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("canteiro"));
}

#[test]
fn serve_help_exits_0() {
    canteiro()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--bind"));
}

#[test]
fn seed_help_exits_0() {
    canteiro()
        .args(["seed", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--work-id"));
}

// ──────────────────────────────────────────────
// 2. Seed subcommand
// ──────────────────────────────────────────────

#[test]
fn seed_provisions_three_demo_activities() {
    let tmp = TempDir::new().unwrap();
    canteiro()
        .args(["seed", "--database", &database_url(&tmp)])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Seeded work 1 with 3 demo activities.",
        ));
}

#[test]
fn seed_is_idempotent_per_work() {
    let tmp = TempDir::new().unwrap();
    let url = database_url(&tmp);

    canteiro()
        .args(["seed", "--database", &url])
        .assert()
        .success();
    canteiro()
        .args(["seed", "--database", &url])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Seed skipped: work 1 already has 3 activities.",
        ));
}

#[test]
fn seed_accepts_a_custom_work_id() {
    let tmp = TempDir::new().unwrap();
    let url = database_url(&tmp);

    canteiro()
        .args(["seed", "--database", &url, "--work-id", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Seeded work 7 with 3 demo activities.",
        ));
    // A different work on the same database seeds independently
    canteiro()
        .args(["seed", "--database", &url, "--work-id", "8"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Seeded work 8 with 3 demo activities.",
        ));
}

#[test]
fn seed_quiet_prints_nothing() {
    let tmp = TempDir::new().unwrap();
    canteiro()
        .args(["seed", "--quiet", "--database", &database_url(&tmp)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seeded").not());
}

// ──────────────────────────────────────────────
// 3. Argument errors
// ──────────────────────────────────────────────

#[test]
fn unknown_subcommand_exits_nonzero() {
    canteiro()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn serve_rejects_non_numeric_port() {
    canteiro()
        .args(["serve", "--port", "not-a-port"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn no_subcommand_prints_usage() {
    canteiro()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
