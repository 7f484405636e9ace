// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;

#[test]
fn status_on_an_unknown_app_fails_with_a_nonzero_exit() {
    let daemon = Daemon::start();
    daemon.cli().args(&["status", "ghost"]).fails().stderr_has("ghost");
}

#[test]
fn start_on_an_unknown_app_fails() {
    let daemon = Daemon::start();
    daemon.cli().args(&["start", "ghost"]).fails();
}

#[test]
fn delete_without_force_can_be_aborted_without_contacting_the_daemon() {
    // `delete` without --force prompts on stdin; feeding it a closed/empty
    // stdin (no input piped) should yield "no" and leave the app untouched.
    let dir = tempfile::tempdir().unwrap();
    let script = shell_script(dir.path(), "keepme", "sleep 30");
    let toml = format!(
        "[[app]]\nname = \"keepme\"\ninterpreter = \"/bin/sh\"\nscript = \"{}\"\ncwd = \"{}\"\n",
        script.display(),
        dir.path().display()
    );
    let daemon = Daemon::start_with_config(Some(&toml));
    assert!(wait_for(1_000, || daemon.cli().args(&["status", "keepme"]).passes().stdout().contains("keepme")));

    let mut cmd = std::process::Command::new(cli_binary());
    cmd.arg("--socket").arg(daemon.socket_path()).args(["delete", "keepme"]);
    cmd.stdin(std::process::Stdio::null());
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("aborted"));

    daemon.cli().args(&["status", "keepme"]).passes().stdout_has("keepme");
}
