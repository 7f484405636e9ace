// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, directory and lock-file
//! bookkeeping (§4.1, §7).

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use fw_core::SystemClock;
use thiserror::Error;
use tokio::net::UnixListener;

use crate::master::Master;

/// Paths the daemon owns for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (persists across restarts): `~/.local/state/fleetwatch`.
    pub state_dir: PathBuf,
    /// Runtime directory holding the control socket and per-worker IPC sockets.
    pub runtime_dir: PathBuf,
    /// Control-plane Unix socket path (§4.9).
    pub socket_path: PathBuf,
    /// Exclusive lock/PID file preventing two daemons from starting at once.
    pub lock_path: PathBuf,
}

impl Config {
    /// Resolve the daemon's paths from the environment (§4.1, §7).
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let runtime_dir = crate::env::runtime_dir()?;
        Ok(Self {
            socket_path: fw_wire::socket_path_under(&runtime_dir),
            lock_path: state_dir.join("daemon.pid"),
            state_dir,
            runtime_dir,
        })
    }
}

/// Live daemon state returned by [`startup`].
pub struct DaemonState {
    pub config: Config,
    // Held only to maintain the exclusive file lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
    pub master: Arc<Master<SystemClock>>,
    pub start_time: Instant,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState").field("config", &self.config).field("start_time", &self.start_time).finish()
    }
}

/// Result of a successful [`startup`]: the daemon state plus the bound
/// control socket, which the caller spawns an accept loop over.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

impl std::fmt::Debug for StartupResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartupResult").field("daemon", &self.daemon).field("listener", &self.listener).finish()
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind control socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonState {
    /// Tear down every running app, then remove the socket and lock files
    /// (§4.7 Global shutdown, §4.1).
    pub async fn shutdown(&self) {
        self.master.shutdown().await;
        let _ = std::fs::remove_file(&self.config.socket_path);
        let _ = std::fs::remove_file(&self.config.lock_path);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
