// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process spawning, child environment construction, and graceful kill with
//! escalation (§4.3).

use crate::env;
use fw_core::{AppConfig, ShutdownSignal, WorkerId};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn child: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to bind IPC listener: {0}")]
    Ipc(#[source] std::io::Error),
}

/// Message sent by a child worker over its IPC channel (§4.3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChildMessage {
    Ready,
    Metrics { memory_bytes: u64, user_ms: u64, system_ms: u64 },
    Heartbeat { uptime_ms: u64 },
    Custom { channel: String, data: serde_json::Value },
}

/// A live child process and the two halves of its byte/IPC plumbing.
pub struct ChildHandle {
    pub pid: u32,
    pub child: Child,
    pub stdout: tokio::process::ChildStdout,
    pub stderr: tokio::process::ChildStderr,
}

/// Outcome of [`ProcessManager::kill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillResult {
    /// The process was already gone, or exited before the timeout.
    Exited,
    /// The timeout elapsed and an unconditional kill was issued.
    Killed,
}

/// Parameters describing one worker's place within its app, used to build
/// its sanitised environment (§4.3, §6).
pub struct WorkerContext<'a> {
    pub app: &'a AppConfig,
    pub worker_id: WorkerId,
    pub resolved_instances: u32,
    pub effective_port: Option<u16>,
    pub reuseport: bool,
    pub ipc_sock_path: &'a std::path::Path,
}

#[derive(Default, Clone, Copy)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the child with cwd, a sanitised environment, and byte-stream
    /// stdio (§4.3). The IPC channel itself is a dedicated Unix listener the
    /// caller binds and whose path is passed via `ctx.ipc_sock_path`; this
    /// method only writes that path into the child's environment.
    pub fn spawn(&self, ctx: &WorkerContext<'_>) -> Result<ChildHandle, ProcessError> {
        let mut cmd = Command::new(&ctx.app.interpreter);
        cmd.arg(&ctx.app.script);
        cmd.current_dir(&ctx.app.cwd);
        cmd.env_clear();
        cmd.envs(sanitised_host_env());
        cmd.envs(&ctx.app.env);
        cmd.env(env::WORKER_ID_ENV, ctx.worker_id.to_string());
        cmd.env(env::APP_NAME_ENV, &ctx.app.name);
        cmd.env(env::INSTANCE_COUNT_ENV, ctx.resolved_instances.to_string());
        if let Some(port) = ctx.effective_port {
            cmd.env(env::PORT_ENV, port.to_string());
        }
        cmd.env(env::REUSEPORT_ENV, if ctx.reuseport { "1" } else { "0" });
        cmd.env(env::IPC_SOCK_ENV, ctx.ipc_sock_path);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(false);

        let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
        let pid = child.id().unwrap_or(0);
        let stdout = child.stdout.take().ok_or_else(|| ProcessError::Spawn(std::io::Error::other("stdout not captured")))?;
        let stderr = child.stderr.take().ok_or_else(|| ProcessError::Spawn(std::io::Error::other("stderr not captured")))?;
        Ok(ChildHandle { pid, child, stdout, stderr })
    }

    /// Send the configured graceful signal, then poll liveness every 100 ms
    /// until the process disappears or `kill_timeout` elapses, escalating to
    /// an unconditional kill on timeout (§4.3).
    pub async fn kill(&self, pid: u32, signal: ShutdownSignal, kill_timeout: std::time::Duration) -> KillResult {
        if pid == 0 || !is_alive(pid) {
            return KillResult::Exited;
        }

        let _ = send_signal(pid, graceful_signal(signal));

        let deadline = Instant::now() + kill_timeout;
        while Instant::now() < deadline {
            if !is_alive(pid) {
                return KillResult::Exited;
            }
            sleep(env::kill_poll_interval()).await;
        }

        if is_alive(pid) {
            let _ = send_signal(pid, Signal::SIGKILL);
        }
        KillResult::Killed
    }
}

fn graceful_signal(signal: ShutdownSignal) -> Signal {
    match signal {
        ShutdownSignal::Graceful => Signal::SIGTERM,
        ShutdownSignal::Interrupt => Signal::SIGINT,
    }
}

fn send_signal(pid: u32, signal: Signal) -> nix::Result<()> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// `signal-0` liveness probe: sending no signal fails with `ESRCH` iff the
/// process is gone (§4.3).
fn is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// The host environment with supervisor-internal keys stripped (§4.3, §6).
fn sanitised_host_env() -> HashMap<String, String> {
    std::env::vars().filter(|(k, _)| !k.starts_with(env::INTERNAL_ENV_PREFIX)).collect()
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
