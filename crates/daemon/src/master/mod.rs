// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the app map and every app's dependencies: worker records, the crash
//! handler, the health checker, and an optional proxy (§4.7).

use crate::env;
use crate::health::HealthChecker;
use crate::logs::LogBuffer;
use crate::process::{ChildMessage, ProcessManager, WorkerContext};
use crate::proxy::{ProxyCluster, ProxyError};
use crate::reload;
use crate::worker::{WorkerHandler, WorkerMap};
use fw_core::{AppConfig, Clock, ResourceSample, Worker, WorkerId, WorkerState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("app `{0}` already exists")]
    AlreadyExists(String),
    #[error("app `{0}` not found")]
    NotFound(String),
    #[error("failed to prepare app directories: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Snapshot view of one worker, the unit returned by `listApps`/`getAppStatus`
/// (§4.7 Query).
#[derive(Debug, Clone, Serialize)]
pub struct WorkerView {
    pub id: WorkerId,
    pub pid: u32,
    pub state: WorkerState,
    pub started_at_ms: Option<u64>,
    pub ready_at_ms: Option<u64>,
    pub restart_count: u32,
    pub consecutive_crashes: u32,
    pub last_exit_code: Option<i32>,
    pub last_exit_signal: Option<i32>,
    pub last_sample: Option<ResourceSample>,
}

impl From<&Worker> for WorkerView {
    fn from(w: &Worker) -> Self {
        Self {
            id: w.id,
            pid: w.pid,
            state: w.state,
            started_at_ms: w.started_at_ms,
            ready_at_ms: w.ready_at_ms,
            restart_count: w.restart_count,
            consecutive_crashes: w.consecutive_crashes,
            last_exit_code: w.last_exit_code,
            last_exit_signal: w.last_exit_signal,
            last_sample: w.last_sample,
        }
    }
}

/// Derived app-level state (§4.7 Query).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    Running,
    Stopped,
    Errored,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub name: String,
    pub state: AppState,
    pub started_at_ms: Option<u64>,
    pub instances: u32,
    pub workers: Vec<WorkerView>,
}

fn derive_state(started_at_ms: Option<u64>, workers: &[WorkerView]) -> AppState {
    if workers.is_empty() {
        return if started_at_ms.is_some() { AppState::Running } else { AppState::Stopped };
    }
    if workers.iter().all(|w| matches!(w.state, WorkerState::Stopped | WorkerState::Errored)) {
        return if workers.iter().any(|w| w.state == WorkerState::Errored) {
            AppState::Errored
        } else {
            AppState::Stopped
        };
    }
    AppState::Running
}

struct AppRuntime<C: Clock> {
    config: AppConfig,
    resolved_instances: u32,
    workers: WorkerMap,
    handler: Arc<WorkerHandler<C>>,
    health: Arc<HealthChecker<C>>,
    proxy: Option<Arc<ProxyCluster>>,
    next_worker_id: WorkerId,
    started_at_ms: Option<u64>,
    ipc_dir: PathBuf,
    logs: LogBuffer,
}

impl<C: Clock> AppRuntime<C> {
    fn status(&self) -> AppStatus {
        let workers: Vec<WorkerView> = self.workers.lock().values().map(WorkerView::from).collect();
        let mut workers = workers;
        workers.sort_by_key(|w| w.id);
        AppStatus {
            name: self.config.name.clone(),
            state: derive_state(self.started_at_ms, &workers),
            started_at_ms: self.started_at_ms,
            instances: self.resolved_instances,
            workers,
        }
    }
}

/// The supervisor's app container (§4.7).
pub struct Master<C: Clock> {
    clock: C,
    apps: Mutex<HashMap<String, AppRuntime<C>>>,
    runtime_dir: PathBuf,
}

fn logical_cpus() -> u32 {
    std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1)
}

/// Resolve a worker's effective port and whether it should enable
/// `SO_REUSEPORT` (§4.3, §4.8, GLOSSARY).
fn effective_port(app: &AppConfig, resolved_instances: u32, id: WorkerId, proxy_present: bool) -> (Option<u16>, bool) {
    let Some(port) = app.port else { return (None, false) };
    if proxy_present {
        (Some(env::worker_port_base().saturating_add(id as u16)), false)
    } else {
        (Some(port), resolved_instances > 1)
    }
}

impl<C: Clock + 'static> Master<C> {
    pub fn new(clock: C, runtime_dir: PathBuf) -> Self {
        Self { clock, apps: Mutex::new(HashMap::new()), runtime_dir }
    }

    /// Current wall-clock time in epoch milliseconds, per this master's `Clock`.
    pub fn clock_epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// §4.7 startApp.
    pub async fn start_app(self: &Arc<Self>, cfg: AppConfig) -> Result<(), MasterError> {
        let name = cfg.name.clone();
        if self.apps.lock().contains_key(&name) {
            return Err(MasterError::AlreadyExists(name));
        }

        let resolved_instances = cfg.instances.resolve(logical_cpus());
        let ipc_dir = self.runtime_dir.join("ipc").join(&name);
        std::fs::create_dir_all(&ipc_dir)?;

        let wants_proxy = cfg.wants_proxy(resolved_instances);
        let proxy = if wants_proxy {
            let port = cfg.port.unwrap_or(0);
            Some(Arc::new(ProxyCluster::start(port).await?))
        } else {
            None
        };

        let runtime = AppRuntime {
            handler: Arc::new(WorkerHandler::new(self.clock.clone())),
            health: Arc::new(HealthChecker::new(self.clock.clone())),
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_worker_id: resolved_instances,
            started_at_ms: Some(self.clock.epoch_ms()),
            ipc_dir,
            logs: LogBuffer::new(),
            resolved_instances,
            config: cfg,
            proxy,
        };
        self.apps.lock().insert(name.clone(), runtime);

        for id in 0..resolved_instances {
            self.spawn_worker(&name, id, 0).await;
        }
        Ok(())
    }

    /// §4.7 stopApp.
    pub async fn stop_app(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        let (workers, handler, health, proxy, shutdown_signal, kill_ms) = {
            let apps = self.apps.lock();
            let app = apps.get(name).ok_or_else(|| MasterError::NotFound(name.to_string()))?;
            (
                app.workers.clone(),
                app.handler.clone(),
                app.health.clone(),
                app.proxy.clone(),
                app.config.shutdown_signal,
                app.config.timeouts.kill_ms,
            )
        };

        let ids: Vec<WorkerId> = workers.lock().keys().copied().collect();
        for id in ids {
            health.stop_checking(id);
            health.stop_heartbeat_monitor(id);
        }

        let process = ProcessManager::new();
        handler.stop_all(&workers, &process, shutdown_signal, Duration::from_millis(kill_ms)).await;

        if let Some(proxy) = &proxy {
            proxy.stop();
        }

        if let Some(app) = self.apps.lock().get_mut(name) {
            app.started_at_ms = None;
        }
        Ok(())
    }

    /// §4.7 restartApp.
    pub async fn restart_app(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        self.stop_app(name).await?;

        let has_port = {
            let apps = self.apps.lock();
            let app = apps.get(name).ok_or_else(|| MasterError::NotFound(name.to_string()))?;
            app.config.port.is_some()
        };
        if has_port {
            tokio::time::sleep(env::port_release_delay()).await;
        }

        self.respawn_fresh(name).await
    }

    /// Control-plane `start{name}` (§4.9): (re)spawn an already-declared app
    /// that is currently stopped. Unlike `startApp`, the name must already be
    /// known — declaration happens once at config-load time.
    pub async fn start_app_by_name(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        if !self.apps.lock().contains_key(name) {
            return Err(MasterError::NotFound(name.to_string()));
        }
        self.respawn_fresh(name).await
    }

    /// Shared tail of `restartApp` and `start_app_by_name`: recreate the
    /// proxy if required, reset worker bookkeeping, and spawn fresh workers
    /// 0..instances−1.
    async fn respawn_fresh(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        let (wants_proxy, port, resolved_instances) = {
            let apps = self.apps.lock();
            let app = apps.get(name).ok_or_else(|| MasterError::NotFound(name.to_string()))?;
            (app.config.wants_proxy(app.resolved_instances), app.config.port, app.resolved_instances)
        };

        let new_proxy = if wants_proxy {
            Some(Arc::new(ProxyCluster::start(port.unwrap_or(0)).await?))
        } else {
            None
        };

        {
            let mut apps = self.apps.lock();
            let Some(app) = apps.get_mut(name) else { return Err(MasterError::NotFound(name.to_string())) };
            app.workers = Arc::new(Mutex::new(HashMap::new()));
            app.next_worker_id = resolved_instances;
            app.started_at_ms = Some(self.clock.epoch_ms());
            app.proxy = new_proxy;
        }

        for id in 0..resolved_instances {
            self.spawn_worker(name, id, 0).await;
        }
        Ok(())
    }

    /// §4.7 reloadApp.
    pub async fn reload_app(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        let (snapshot, reload_cfg, proxy, handler) = {
            let apps = self.apps.lock();
            let app = apps.get(name).ok_or_else(|| MasterError::NotFound(name.to_string()))?;
            let mut workers: Vec<Worker> = app.workers.lock().values().cloned().collect();
            workers.sort_by_key(|w| w.id);
            (workers, app.config.reload, app.proxy.clone(), app.handler.clone())
        };

        let master = self.clone();
        let name_for_spawn = name.to_string();
        let spawn_and_track = move |_old_id: WorkerId| {
            let master = master.clone();
            let name = name_for_spawn.clone();
            async move {
                let new_id = {
                    let mut apps = master.apps.lock();
                    let Some(app) = apps.get_mut(&name) else { return 0 };
                    let id = app.next_worker_id;
                    app.next_worker_id += 1;
                    id
                };
                master.spawn_worker(&name, new_id, 0).await;
                new_id
            }
        };

        let workers_for_status = {
            let apps = self.apps.lock();
            apps.get(name).map(|a| a.workers.clone())
        };
        let is_online = move |id: WorkerId| {
            workers_for_status
                .as_ref()
                .and_then(|w| w.lock().get(&id).map(|w| w.state))
                .unwrap_or(WorkerState::Spawning)
        };

        let process = ProcessManager::new();
        let kill_timeout = {
            let apps = self.apps.lock();
            Duration::from_millis(apps.get(name).map(|a| a.config.timeouts.kill_ms).unwrap_or(10_000))
        };
        let shutdown_signal = {
            let apps = self.apps.lock();
            apps.get(name).map(|a| a.config.shutdown_signal).unwrap_or_default()
        };
        let workers_for_drain = {
            let apps = self.apps.lock();
            apps.get(name).map(|a| a.workers.clone())
        };
        let drain_and_stop = move |old_id: WorkerId| {
            let handler = handler.clone();
            let process = process.clone();
            let proxy = proxy.clone();
            let workers = workers_for_drain.clone();
            async move {
                if let Some(proxy) = &proxy {
                    proxy.remove_worker(old_id);
                }
                if let Some(workers) = workers {
                    handler.drain_and_stop(&workers, old_id, &process, shutdown_signal, kill_timeout).await;
                }
            }
        };

        reload::reload(snapshot, &reload_cfg, spawn_and_track, is_online, drain_and_stop).await;
        Ok(())
    }

    /// §4.7 deleteApp: no-op on an unknown name.
    pub async fn delete_app(self: &Arc<Self>, name: &str) -> Result<(), MasterError> {
        if !self.apps.lock().contains_key(name) {
            return Ok(());
        }
        self.stop_app(name).await?;
        self.apps.lock().remove(name);
        Ok(())
    }

    pub fn list_apps(&self) -> Vec<AppStatus> {
        let mut apps: Vec<AppStatus> = self.apps.lock().values().map(AppRuntime::status).collect();
        apps.sort_by(|a, b| a.name.cmp(&b.name));
        apps
    }

    pub fn get_app_status(&self, name: &str) -> Option<AppStatus> {
        self.apps.lock().get(name).map(AppRuntime::status)
    }

    pub fn tail_logs(&self, name: &str, lines: Option<usize>) -> Option<Vec<String>> {
        self.apps.lock().get(name).map(|app| app.logs.tail(lines))
    }

    /// Snapshot of the entire in-memory master state, for the `dump` command.
    pub fn dump(&self) -> Vec<AppStatus> {
        self.list_apps()
    }

    /// Global shutdown: stop every app in parallel (§4.7 Global shutdown).
    /// Log-subsystem teardown and externally registered shutdown callbacks
    /// are the daemon lifecycle's responsibility (§4.7), invoked by the
    /// caller after this returns.
    pub async fn shutdown(self: &Arc<Self>) {
        let names: Vec<String> = self.apps.lock().keys().cloned().collect();
        let mut tasks = tokio::task::JoinSet::new();
        for name in names {
            let master = self.clone();
            tasks.spawn(async move {
                if let Err(e) = master.stop_app(&name).await {
                    warn!(app = name, "error stopping app during shutdown: {e}");
                }
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    /// §4.7 Spawn / Restart one worker (private, shared helper): creates or
    /// resets the worker record, binds its IPC rendezvous socket, asks
    /// `ProcessManager` to spawn, and installs every callback (IPC dispatch,
    /// exit handling, stable timer, health/heartbeat monitors, stdio piping).
    fn spawn_worker<'a>(
        self: &'a Arc<Self>,
        name: &'a str,
        id: WorkerId,
        restart_count: u32,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        let (config, resolved_instances, ipc_dir, handler, health, workers, proxy, logs) = {
            let apps = self.apps.lock();
            let Some(app) = apps.get(name) else { return };
            (
                app.config.clone(),
                app.resolved_instances,
                app.ipc_dir.clone(),
                app.handler.clone(),
                app.health.clone(),
                app.workers.clone(),
                app.proxy.clone(),
                app.logs.clone(),
            )
        };

        {
            let mut workers_guard = workers.lock();
            workers_guard.entry(id).or_insert_with(|| Worker::new(id, restart_count));
        }
        handler.mark_starting(&workers, id);

        let ipc_sock_path = ipc_dir.join(format!("{id}.sock"));
        let _ = std::fs::remove_file(&ipc_sock_path);
        let ipc_listener = match tokio::net::UnixListener::bind(&ipc_sock_path) {
            Ok(listener) => listener,
            Err(e) => {
                error!(app = name, worker_id = id, "failed to bind worker ipc socket: {e}");
                handler.force_errored(&workers, id);
                return;
            }
        };

        let (port, reuseport) = effective_port(&config, resolved_instances, id, proxy.is_some());
        let process = ProcessManager::new();
        let handle = {
            let ctx = WorkerContext {
                app: &config,
                worker_id: id,
                resolved_instances,
                effective_port: port,
                reuseport,
                ipc_sock_path: &ipc_sock_path,
            };
            process.spawn(&ctx)
        };
        let mut handle = match handle {
            Ok(h) => h,
            Err(e) => {
                error!(app = name, worker_id = id, "spawn failed: {e}");
                handler.force_errored(&workers, id);
                return;
            }
        };

        {
            let mut workers_guard = workers.lock();
            if let Some(worker) = workers_guard.get_mut(&id) {
                worker.pid = handle.pid;
                worker.started_at_ms = Some(self.clock.epoch_ms());
            }
        }

        if let Some(internal_port) = port {
            if let Some(health_check) = &config.health_check {
                let master = self.clone();
                let name_owned = name.to_string();
                health.start_checking(
                    id,
                    internal_port,
                    health_check.clone(),
                    Arc::new(move |id, reason: &str| {
                        let master = master.clone();
                        let name_owned = name_owned.clone();
                        let reason = reason.to_string();
                        tokio::spawn(async move { master.on_worker_unhealthy(&name_owned, id, &reason).await });
                    }),
                );
            }
        }
        {
            let master = self.clone();
            let name_owned = name.to_string();
            health.start_heartbeat_monitor(
                id,
                config.heartbeat,
                Arc::new(move |id, reason: &str| {
                    let master = master.clone();
                    let name_owned = name_owned.clone();
                    let reason = reason.to_string();
                    tokio::spawn(async move { master.on_heartbeat_stale(&name_owned, id, &reason).await });
                }),
            );
        }

        handler.install_stable_timer(&workers, id, Duration::from_millis(config.timeouts.min_uptime_ms));

        spawn_stdio_pipe(logs.clone(), id, "stdout", handle.stdout);
        spawn_stdio_pipe(logs.clone(), id, "stderr", handle.stderr);

        let ipc_workers = workers.clone();
        let ipc_health = health.clone();
        let ipc_handler = handler.clone();
        let ipc_proxy = proxy.clone();
        let ipc_name = name.to_string();
        tokio::spawn(async move {
            let Ok((stream, _addr)) = ipc_listener.accept().await else { return };
            let mut reader = fw_wire::FrameReader::new(stream);
            loop {
                match reader.next_object().await {
                    Ok(Some(value)) => {
                        let Ok(msg) = serde_json::from_value::<ChildMessage>(value) else { continue };
                        dispatch_child_message(
                            &ipc_name,
                            id,
                            msg,
                            &ipc_workers,
                            &ipc_handler,
                            &ipc_health,
                            ipc_proxy.as_deref(),
                            port,
                        );
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        });

        let master = self.clone();
        let name_owned = name.to_string();
        let exit_workers = workers.clone();
        let exit_handler = handler.clone();
        let exit_health = health.clone();
        let exit_proxy = proxy.clone();
        let backoff = config.backoff;
        tokio::spawn(async move {
            let status = handle.child.wait().await;
            exit_health.stop_checking(id);
            exit_health.stop_heartbeat_monitor(id);
            if let Some(proxy) = &exit_proxy {
                proxy.remove_worker(id);
            }
            let (exit_code, exit_signal) = match status {
                Ok(status) => (status.code(), status.signal()),
                Err(e) => {
                    error!(app = name_owned, worker_id = id, "error waiting on child: {e}");
                    (None, None)
                }
            };

            let restart_name = name_owned.clone();
            exit_handler.on_exit(&exit_workers, id, exit_code, exit_signal, &backoff, move |id| {
                tokio::spawn(async move {
                    master.restart_one_worker(&restart_name, id).await;
                });
            });
        });
        })
    }

    async fn on_worker_unhealthy(self: &Arc<Self>, name: &str, id: WorkerId, reason: &str) {
        warn!(app = name, worker_id = id, reason, "worker unhealthy");
        self.restart_one_worker(name, id).await;
    }

    async fn on_heartbeat_stale(self: &Arc<Self>, name: &str, id: WorkerId, reason: &str) {
        warn!(app = name, worker_id = id, reason, "heartbeat stale");
        let should_restart = {
            let apps = self.apps.lock();
            apps.get(name)
                .map(|app| matches!(app.workers.lock().get(&id).map(|w| w.state), Some(WorkerState::Online) | Some(WorkerState::Starting)))
                .unwrap_or(false)
        };
        if should_restart {
            self.restart_one_worker(name, id).await;
        }
    }

    /// §4.7 Restart one worker (private): kill the old child if still alive,
    /// then reset and respawn the same worker id, preserving its lifetime
    /// `restart_count` (incremented) across the new generation.
    async fn restart_one_worker(self: &Arc<Self>, name: &str, id: WorkerId) {
        let (workers, handler, health, shutdown_signal, kill_ms, old_restart_count) = {
            let apps = self.apps.lock();
            let Some(app) = apps.get(name) else { return };
            let old_restart_count = app.workers.lock().get(&id).map(|w| w.restart_count).unwrap_or(0);
            (app.workers.clone(), app.handler.clone(), app.health.clone(), app.config.shutdown_signal, app.config.timeouts.kill_ms, old_restart_count)
        };

        health.stop_checking(id);
        health.stop_heartbeat_monitor(id);

        let old_pid = workers.lock().get(&id).map(|w| w.pid).unwrap_or(0);
        if old_pid != 0 {
            let process = ProcessManager::new();
            process.kill(old_pid, shutdown_signal, Duration::from_millis(kill_ms)).await;
        }

        handler.reset_for_restart(&workers, id, old_restart_count + 1);
        self.spawn_worker(name, id, old_restart_count + 1).await;
    }
}

/// Route one decoded child message (§4.3 inbound IPC dispatch, §4.7 Spawn
/// callbacks). `internal_port` is the worker's own port, used to register it
/// with the proxy (if any) once it reports ready — a `ready` message is
/// always observed before a worker is added to its proxy (§5, Ordering).
fn dispatch_child_message<C: Clock>(
    name: &str,
    id: WorkerId,
    msg: ChildMessage,
    workers: &WorkerMap,
    handler: &WorkerHandler<C>,
    health: &HealthChecker<C>,
    proxy: Option<&ProxyCluster>,
    internal_port: Option<u16>,
) {
    match msg {
        ChildMessage::Ready => {
            handler.on_ready(workers, id);
            if let (Some(proxy), Some(port)) = (proxy, internal_port) {
                proxy.add_worker(id, port);
            }
            debug!(app = name, worker_id = id, "worker ready");
        }
        ChildMessage::Metrics { memory_bytes, user_ms, system_ms } => {
            handler.on_metrics(workers, id, memory_bytes, user_ms, system_ms);
        }
        ChildMessage::Heartbeat { .. } => {
            health.on_heartbeat(id);
        }
        ChildMessage::Custom { channel, .. } => {
            debug!(app = name, worker_id = id, channel, "custom ipc message");
        }
    }
}

fn spawn_stdio_pipe(logs: LogBuffer, id: WorkerId, stream: &'static str, reader: impl tokio::io::AsyncRead + Unpin + Send + 'static) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    info!(worker_id = id, stream, "{line}");
                    logs.push(id, stream, &line);
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }
    });
}

#[cfg(test)]
#[path = "master_tests.rs"]
mod tests;
