//! CLI argument parsing tests

mod common;

use assert_cmd::Command;
use common::TestEnv;
use predicates::prelude::*;

fn analyzer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_analyzer"))
}

#[test]
fn test_help_flag() {
    analyzer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema-validated output"))
        .stdout(predicate::str::contains("calc"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_version_flag() {
    analyzer()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_args_shows_usage() {
    analyzer()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_command() {
    analyzer()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_calc_help() {
    analyzer()
        .args(["calc", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--num1"))
        .stdout(predicate::str::contains("--num2"))
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--timeout"));
}

#[test]
fn test_calc_requires_numbers() {
    analyzer()
        .args(["calc", "--num1", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--num2"));
}

#[test]
fn test_calc_rejects_non_numeric() {
    analyzer()
        .args(["calc", "--num1", "three", "--num2", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_calc_without_api_key_fails() {
    let env = TestEnv::new().unwrap();
    env.command()
        .args(["calc", "--num1", "3", "--num2", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No API key configured"));
}
