// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level CLI specs.
//!
//! These drive the built `schmux` binary. Anything needing a live daemon,
//! tmux server, or network stays in the daemon crate's unit tests with
//! fakes; here we pin the CLI surface itself.

use assert_cmd::Command;

fn schmux() -> (Command, tempfile::TempDir) {
    let mut cmd = Command::cargo_bin("schmux").expect("schmux binary builds");
    // Isolate from any real ~/.schmux and from a running daemon.
    let dir = tempfile::tempdir().expect("tempdir");
    cmd.env("SCHMUX_DIR", dir.path());
    cmd.env("SCHMUX_PORT", "1"); // nothing listens on port 1
    (cmd, dir)
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).to_string()
}

#[test]
fn help_lists_all_commands() {
    let (mut cmd, _dir) = schmux();
    let assert = cmd.arg("--help").assert().success();
    let output = stdout_of(&assert);
    for command in [
        "start",
        "stop",
        "status",
        "daemon-run",
        "spawn",
        "list",
        "attach",
        "dispose",
        "refresh-overlay",
    ] {
        assert!(output.contains(command), "--help is missing `{}`:\n{}", command, output);
    }
}

#[test]
fn version_prints() {
    let (mut cmd, _dir) = schmux();
    cmd.arg("--version").assert().success();
}

#[test]
fn spawn_requires_target() {
    let (mut cmd, _dir) = schmux();
    cmd.arg("spawn").assert().failure();
}

#[test]
fn spawn_help_documents_flags() {
    let (mut cmd, _dir) = schmux();
    let assert = cmd.args(["spawn", "--help"]).assert().success();
    let output = stdout_of(&assert);
    for flag in ["--target", "--repo", "--branch", "--workspace", "--nickname", "--resume"] {
        assert!(output.contains(flag), "spawn --help is missing `{}`:\n{}", flag, output);
    }
}

#[test]
fn status_without_daemon_is_not_an_error() {
    let (mut cmd, _dir) = schmux();
    let assert = cmd.arg("status").assert().success();
    assert!(stdout_of(&assert).contains("not running"));
}

#[test]
fn stop_without_daemon_is_not_an_error() {
    let (mut cmd, _dir) = schmux();
    let assert = cmd.arg("stop").assert().success();
    assert!(stdout_of(&assert).contains("not running"));
}

#[test]
fn list_without_daemon_fails_cleanly() {
    let (mut cmd, _dir) = schmux();
    cmd.arg("list").assert().failure().code(1);
}

#[test]
fn unknown_subcommand_rejected() {
    let (mut cmd, _dir) = schmux();
    cmd.arg("frobnicate").assert().failure();
}
