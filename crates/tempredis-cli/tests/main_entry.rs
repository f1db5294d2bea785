//! Integration tests for the `tempredis` binary entry point.
//!
//! Covers help output and user-facing errors; starting a real server is
//! exercised by the library tests.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn help_lists_the_configuration_flags() {
    let mut command = cargo_bin_cmd!("tempredis");
    command.arg("--help");
    command
        .assert()
        .success()
        .stdout(contains("--config-file"))
        .stdout(contains("--wait-for"));
}

#[test]
fn missing_server_binary_exits_with_failure() {
    let mut command = cargo_bin_cmd!("tempredis");
    command.args(["--server-bin", "/nonexistent/tempredis/redis-server"]);
    command
        .assert()
        .failure()
        .stderr(contains("server binary not found"));
}

#[test]
fn invalid_directive_is_a_usage_error() {
    let mut command = cargo_bin_cmd!("tempredis");
    command.args(["--set", "no-equals-sign"]);
    command
        .assert()
        .code(2)
        .stderr(contains("KEY=VALUE"));
}
