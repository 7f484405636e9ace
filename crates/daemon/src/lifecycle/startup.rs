// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup: lock acquisition, directory creation, and control-socket
//! binding (§4.1, §7).

use std::io::Write as _;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use fw_core::SystemClock;
use tokio::net::UnixListener;
use tracing::info;

use crate::master::Master;

use super::{Config, DaemonState, LifecycleError, StartupResult};

/// Start the daemon: acquire the exclusive lock, prepare directories, and
/// bind the control socket. On any failure after the lock is held, the
/// partially-created socket/lock files are cleaned up before returning.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // A lock failure means another daemon already owns these files;
            // removing them would corrupt its state.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.runtime_dir)?;

    // Avoid truncating before the lock is held, which would wipe the
    // running daemon's PID out from under it.
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600))?;

    let master = Arc::new(Master::new(SystemClock, config.runtime_dir.clone()));

    info!(pid = std::process::id(), socket = %config.socket_path.display(), "fleetwatchd started");

    Ok(StartupResult {
        daemon: DaemonState { config: config.clone(), lock_file, master, start_time: Instant::now() },
        listener,
    })
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
