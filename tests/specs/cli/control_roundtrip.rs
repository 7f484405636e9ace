// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;

#[test]
fn ping_reaches_a_freshly_started_daemon() {
    let daemon = Daemon::start();
    let reply = daemon.cli().args(&["ping"]).passes();
    similar_asserts::assert_eq!(reply.stdout(), "pong\n");
}

#[test]
fn dump_reports_declared_apps_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let script = shell_script(dir.path(), "dumped", "sleep 30");
    let toml = format!(
        "[[app]]\nname = \"dumped\"\ninterpreter = \"/bin/sh\"\nscript = \"{}\"\ncwd = \"{}\"\n",
        script.display(),
        dir.path().display()
    );
    let daemon = Daemon::start_with_config(Some(&toml));

    assert!(wait_for(1_000, || daemon.cli().args(&["dump"]).passes().stdout().contains("\"dumped\"")));

    let dump = daemon.cli().args(&["dump"]).passes();
    let apps = dump.json();
    let names: Vec<&str> = apps.as_array().unwrap().iter().map(|a| a["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["dumped"]);
}

#[test]
fn logs_streams_output_from_a_running_worker() {
    let dir = tempfile::tempdir().unwrap();
    let script = shell_script(dir.path(), "logger", "echo hello-from-worker; sleep 30");
    let toml = format!(
        "[[app]]\nname = \"logger\"\ninterpreter = \"/bin/sh\"\nscript = \"{}\"\ncwd = \"{}\"\n",
        script.display(),
        dir.path().display()
    );
    let daemon = Daemon::start_with_config(Some(&toml));

    assert!(wait_for(1_000, || daemon.cli().args(&["status", "logger"]).passes().stdout().contains("logger")));
    // Give the worker a moment to emit its line before tailing.
    std::thread::sleep(std::time::Duration::from_millis(300));

    daemon.cli().args(&["logs", "logger"]).passes().stdout_has("hello-from-worker");
}

#[test]
fn kill_daemon_causes_the_process_to_exit() {
    let daemon = Daemon::start();
    daemon.cli().args(&["kill-daemon"]).passes().stdout_has("shutting down");
    assert!(wait_for(1_000, || !daemon.socket_path().exists()));
}
