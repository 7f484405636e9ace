// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: `FLEETWATCH_STATE_DIR` > `XDG_STATE_HOME/fleetwatch` > `~/.local/state/fleetwatch`.
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FLEETWATCH_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("fleetwatch"));
    }
    dirs::home_dir()
        .map(|home| home.join(".local/state/fleetwatch"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Resolve runtime directory for the rendezvous socket: `FLEETWATCH_RUNTIME_DIR` >
/// `XDG_RUNTIME_DIR/fleetwatch` > the state directory (fallback for systems without
/// a runtime dir, e.g. macOS).
pub fn runtime_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("FLEETWATCH_RUNTIME_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(xdg).join("fleetwatch"));
    }
    state_dir()
}

/// Default client request timeout (§4.9, §5c).
pub fn client_timeout() -> Duration {
    std::env::var("FLEETWATCH_CLIENT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(fw_wire::DEFAULT_TIMEOUT)
}

/// Interval at which `kill` polls for liveness while escalating (§4.3).
pub fn kill_poll_interval() -> Duration {
    Duration::from_millis(100)
}

/// Fixed delay before respawning an app that owns a port, to avoid
/// address-in-use against the same port on immediate respawn (§4.7 restartApp).
pub fn port_release_delay() -> Duration {
    std::env::var("FLEETWATCH_PORT_RELEASE_DELAY_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(250))
}

/// Small delay before the daemon process actually exits after a `kill-daemon`
/// response has been written, so the response frame reaches the client first
/// (§4.9).
pub fn shutdown_flush_delay() -> Duration {
    Duration::from_millis(50)
}

/// Base internal port for per-worker HTTP probes/proxy upstreams under the
/// `PortReuse`-absent default allocation (§4.4: "a fixed base plus the worker id").
pub fn worker_port_base() -> u16 {
    std::env::var("FLEETWATCH_WORKER_PORT_BASE")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(20_000)
}

/// Name of the env var a spawned child reads to find its IPC rendezvous socket.
pub const IPC_SOCK_ENV: &str = "FLEETWATCH_IPC_SOCK";
/// Name of the env var written with the worker's stable integer id.
pub const WORKER_ID_ENV: &str = "FLEETWATCH_WORKER_ID";
/// Name of the env var written with the app's name.
pub const APP_NAME_ENV: &str = "FLEETWATCH_APP_NAME";
/// Name of the env var written with the app's resolved instance count.
pub const INSTANCE_COUNT_ENV: &str = "FLEETWATCH_INSTANCE_COUNT";
/// Name of the env var written with the worker's effective port, if any.
pub const PORT_ENV: &str = "FLEETWATCH_PORT";
/// Name of the env var indicating `SO_REUSEPORT` should be enabled by the child.
pub const REUSEPORT_ENV: &str = "FLEETWATCH_REUSEPORT";

/// Supervisor-internal environment key prefix stripped from the host
/// environment before overlaying an app's configured env (§4.3, §6).
pub const INTERNAL_ENV_PREFIX: &str = "FLEETWATCH_";
