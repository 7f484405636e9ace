// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetwatchd`: long-running supervisor daemon.
//!
//! Loads the declared apps, starts each one, binds the control socket, and
//! runs until asked to stop via the control plane or a process signal.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use fw_daemon::control::ControlServer;
use fw_daemon::lifecycle::{self, Config, LifecycleError, StartupResult};
use fw_daemon::{config, ConfigLoadError};

#[tokio::main]
async fn main() {
    setup_logging();

    if let Err(e) = run().await {
        error!("fleetwatchd exiting: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let app_config = Config::load()?;

    let StartupResult { daemon, listener } = match lifecycle::startup(&app_config).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&app_config.lock_path).unwrap_or_default();
            eprintln!("fleetwatchd is already running (pid: {})", pid.trim());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = load_declared_apps(&daemon.master, &app_config.state_dir).await {
        warn!("no apps loaded at startup: {e}");
    }

    let shutdown = Arc::new(Notify::new());
    let server = ControlServer::new(daemon.master.clone(), shutdown.clone());
    tokio::spawn(server.run(listener));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(pid = std::process::id(), socket = %app_config.socket_path.display(), "fleetwatchd ready");

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested via control plane"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    daemon.shutdown().await;
    info!("fleetwatchd stopped");
    Ok(())
}

/// Apps are declared in `<state_dir>/apps.toml`, overridable via
/// `FLEETWATCH_CONFIG`. Missing file is not an error: the daemon starts with
/// no apps and they can be added later via the control plane once a
/// `declare`-style command exists, or the file is created before next start.
async fn load_declared_apps(master: &Arc<fw_daemon::Master<fw_core::SystemClock>>, state_dir: &std::path::Path) -> Result<(), ConfigLoadError> {
    let path = apps_config_path(state_dir);
    if !path.exists() {
        return Ok(());
    }
    let apps = config::load_apps(&path)?;
    for (name, cfg) in apps {
        if let Err(e) = master.start_app(cfg).await {
            error!(app = %name, "failed to start declared app: {e}");
        }
    }
    Ok(())
}

fn apps_config_path(state_dir: &std::path::Path) -> PathBuf {
    std::env::var("FLEETWATCH_CONFIG").map(PathBuf::from).unwrap_or_else(|_| state_dir.join("apps.toml"))
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
