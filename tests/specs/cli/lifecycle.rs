// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;

#[test]
fn start_list_stop_delete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let script = shell_script(dir.path(), "sleeper", "sleep 30");
    let toml = format!(
        "[[app]]\nname = \"sleeper\"\ninterpreter = \"/bin/sh\"\nscript = \"{}\"\ncwd = \"{}\"\n",
        script.display(),
        dir.path().display()
    );
    let daemon = Daemon::start_with_config(Some(&toml));

    assert!(wait_for(1_000, || {
        daemon.cli().args(&["list", "--json"]).passes().stdout().contains("\"sleeper\"")
    }));

    daemon.cli().args(&["status", "sleeper"]).passes().stdout_has("sleeper");

    daemon.cli().args(&["stop", "sleeper"]).passes();
    assert!(wait_for(1_000, || daemon.cli().args(&["status", "sleeper"]).passes().stdout().contains("stopped")));

    daemon.cli().args(&["delete", "sleeper", "--force"]).passes();
    let listing = daemon.cli().args(&["list", "--json"]).passes();
    assert_eq!(listing.json(), serde_json::json!([]));
}
