// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;

#[test]
fn crashing_app_gives_up_after_max_restarts_and_status_reports_errored() {
    let dir = tempfile::tempdir().unwrap();
    let script = shell_script(dir.path(), "crasher", "exit 7");
    let toml = format!(
        "[[app]]\nname = \"crasher\"\ninterpreter = \"/bin/sh\"\nscript = \"{}\"\ncwd = \"{}\"\n\n\
         [app.backoff]\ninitial_ms = 20\nmultiplier = 2.0\nmax_ms = 100\nwindow_ms = 60000\nmax_restarts = 2\n",
        script.display(),
        dir.path().display()
    );
    let daemon = Daemon::start_with_config(Some(&toml));

    assert!(wait_for(2_000, || daemon.cli().args(&["status", "crasher"]).passes().stdout().contains("errored")));

    let status = daemon.cli().args(&["status", "crasher"]).passes();
    let stdout = status.stdout();
    assert!(stdout.contains("crasher"));
}
