//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("gatewright");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provision").and(predicate::str::contains("teardown")));
}

#[test]
fn missing_subcommand_is_rejected() {
    let mut cmd = cargo_bin_cmd!("gatewright");
    cmd.assert().failure();
}

#[test]
fn status_without_checkpoint_reports_absence() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("gatewright");
    cmd.current_dir(tmp.path())
        .env_remove("GATEWRIGHT_CHECKPOINT_PATH")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoint found"));
}

#[test]
fn teardown_without_checkpoint_is_a_no_op() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("gatewright");
    cmd.current_dir(tmp.path())
        .env_remove("GATEWRIGHT_CHECKPOINT_PATH")
        .arg("teardown")
        .assert()
        .success()
        .stdout("");
}

#[test]
fn pricing_without_checkpoint_asks_for_provisioning() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("gatewright");
    cmd.current_dir(tmp.path())
        .env_remove("GATEWRIGHT_CHECKPOINT_PATH")
        .args(["tools", "--architecture", "one t3.micro"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("run `gatewright provision` first"));
}
