//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn cli_without_arguments_prints_help() {
    let mut cmd = cargo_bin_cmd!("ecloud");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_subcommands() {
    let mut cmd = cargo_bin_cmd!("ecloud");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("decode-id").and(predicate::str::contains("wait")));
}

#[test]
fn decode_id_prints_parts_without_configuration() {
    let mut cmd = cargo_bin_cmd!("ecloud");
    cmd.args(["decode-id", "image", "abc:pool1:template"])
        .assert()
        .success()
        .stdout("abc\npool1\nTEMPLATE\n");
}

#[test]
fn decode_id_reports_malformed_input() {
    let mut cmd = cargo_bin_cmd!("ecloud");
    cmd.args(["decode-id", "disk", "vm-7"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot decode disk identifier 'vm-7'"));
}

#[test]
fn get_without_configuration_fails_with_configuration_error() {
    let mut cmd = cargo_bin_cmd!("ecloud");
    cmd.env_remove("ECLOUD_ENDPOINT")
        .env_remove("ECLOUD_ACCESS_KEY")
        .env_remove("ECLOUD_SECRET_KEY")
        .args(["get", "/tasks/1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration"));
}
