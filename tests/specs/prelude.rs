// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for spawning `fleetwatchd`, running `fleetwatch`
//! against it, and asserting on the results.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output};
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;

/// Resolve a workspace binary, falling back from the standard target
/// directory to the location next to the test binary itself.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

fn daemon_binary() -> PathBuf {
    binary_path("fleetwatchd")
}

pub fn cli_binary() -> PathBuf {
    binary_path("fleetwatch")
}

/// A running `fleetwatchd` instance scoped to a temporary state/runtime
/// directory pair. Killed on drop.
pub struct Daemon {
    child: Child,
    state_dir: tempfile::TempDir,
    runtime_dir: tempfile::TempDir,
}

impl Daemon {
    /// Start the daemon with no apps declared.
    pub fn start() -> Self {
        Self::start_with_config(None)
    }

    /// Start the daemon pointed at an `apps.toml` document.
    pub fn start_with_config(apps_toml: Option<&str>) -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        let runtime_dir = tempfile::tempdir().unwrap();

        let mut cmd = Command::new(daemon_binary());
        cmd.env("FLEETWATCH_STATE_DIR", state_dir.path());
        cmd.env("FLEETWATCH_RUNTIME_DIR", runtime_dir.path());
        cmd.env("RUST_LOG", "warn");
        if let Some(toml) = apps_toml {
            let config_path = state_dir.path().join("apps.toml");
            std::fs::write(&config_path, toml).unwrap();
            cmd.env("FLEETWATCH_CONFIG", &config_path);
        }
        cmd.stdout(std::process::Stdio::null());
        cmd.stderr(std::process::Stdio::null());

        let child = cmd.spawn().expect("fleetwatchd should spawn");
        let daemon = Self { child, state_dir, runtime_dir };
        assert!(wait_for(2_000, || daemon.socket_path().exists()), "daemon did not bind its control socket in time");
        daemon
    }

    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.path().join("fleetwatch.sock")
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    /// Build a CLI invocation targeting this daemon.
    pub fn cli(&self) -> CliBuilder {
        CliBuilder::new(self.socket_path())
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Fluent builder for `fleetwatch` CLI invocations.
pub struct CliBuilder {
    socket: PathBuf,
    args: Vec<String>,
}

impl CliBuilder {
    fn new(socket: PathBuf) -> Self {
        Self { socket, args: Vec::new() }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(cli_binary());
        cmd.arg("--socket").arg(&self.socket);
        cmd.args(&self.args);
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let output = self.command().output().expect("fleetwatch should run");
        let output = output.assert().success().get_output().clone();
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let output = self.command().output().expect("fleetwatch should run");
        let output = output.assert().failure().get_output().clone();
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain '{expected}'\nstdout: {stdout}");
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain '{expected}'\nstderr: {stderr}");
        self
    }

    /// Parse stdout as JSON, for `--json` output.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).expect("stdout should be valid JSON")
    }
}

/// Poll `condition` until it returns true or `timeout_ms` elapses.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

/// Write an executable shell script under `dir` and return its path, for use
/// as an app's `script` with `interpreter = "/bin/sh"`.
pub fn shell_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("{name}.sh"));
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path
}
