// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Glue between one worker record and the lifecycle/crash-recovery/process
//! primitives: IPC dispatch, exit handling, drain/stop, and the stable-timer
//! (§4.6).

use crate::process::{KillResult, ProcessManager};
use fw_core::{
    BackoffConfig, Clock, CrashRecovery, Lifecycle, ResourceSample, RestartDecision, ShutdownSignal,
    Worker, WorkerId, WorkerState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::warn;

/// Shared ownership of one app's worker records (§3, Ownership).
pub type WorkerMap = Arc<Mutex<HashMap<WorkerId, Worker>>>;

/// Outcome of handling a worker's exit (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Graceful path: the worker reached `stopped`.
    Stopped,
    /// Crash path, but the crash budget is exhausted: `errored`, terminal.
    GaveUp,
    /// Crash path: a backoff timer has been scheduled.
    BackoffScheduled,
}

/// Owns the backoff/stable timer bookkeeping for one app's workers, plus the
/// pure lifecycle table and per-app crash-recovery state (§3, §4.6).
///
/// Always used behind an `Arc` so timer callbacks (run in spawned tasks) can
/// call back into it without a retained cycle through the master (§9, Cyclic
/// ownership: the back-edge is the `on_backoff_fire` closure passed in by the
/// caller, not a stored reference to `Master`).
pub struct WorkerHandler<C: Clock> {
    clock: C,
    lifecycle: Lifecycle,
    crash: Mutex<CrashRecovery<C>>,
    backoff_timers: Mutex<HashMap<WorkerId, JoinHandle<()>>>,
    stable_timers: Mutex<HashMap<WorkerId, JoinHandle<()>>>,
}

impl<C: Clock + 'static> WorkerHandler<C> {
    pub fn new(clock: C) -> Self {
        let crash = CrashRecovery::new(clock.clone());
        Self {
            clock,
            lifecycle: Lifecycle::new(),
            crash: Mutex::new(crash),
            backoff_timers: Mutex::new(HashMap::new()),
            stable_timers: Mutex::new(HashMap::new()),
        }
    }

    /// `ready` → `online`, set ready-at = now (§4.6).
    pub fn on_ready(&self, workers: &WorkerMap, id: WorkerId) {
        let mut workers = workers.lock();
        if let Some(worker) = workers.get_mut(&id) {
            self.lifecycle.transition(worker, WorkerState::Online);
            worker.ready_at_ms = Some(self.clock.epoch_ms());
        }
    }

    /// `metrics` → update memory/cpu snapshot, `cpu_percent` left at zero
    /// for an aggregator to derive a rate (§4.6, §9).
    pub fn on_metrics(&self, workers: &WorkerMap, id: WorkerId, memory_bytes: u64, user_ms: u64, system_ms: u64) {
        let mut workers = workers.lock();
        if let Some(worker) = workers.get_mut(&id) {
            worker.last_sample = Some(ResourceSample { memory_bytes, user_ms, system_ms, cpu_percent: 0.0 });
        }
    }

    /// `spawning` → `starting` (§4.7 Spawn).
    pub fn mark_starting(&self, workers: &WorkerMap, id: WorkerId) {
        let mut workers = workers.lock();
        if let Some(worker) = workers.get_mut(&id) {
            self.lifecycle.transition(worker, WorkerState::Starting);
        }
    }

    /// Force a worker straight to `errored`, used when spawning itself fails
    /// before a process ever existed (§7, "Configuration"/"Transient child
    /// failure" boundary: a spawn failure is not a crash of a live process).
    pub fn force_errored(&self, workers: &WorkerMap, id: WorkerId) {
        let mut workers = workers.lock();
        if let Some(worker) = workers.get_mut(&id) {
            self.lifecycle.force_state(worker, WorkerState::Errored);
        }
    }

    /// Reset a worker record to `spawning` for a fresh generation, forcing
    /// through `stopped` first if the current state doesn't legally reach
    /// `spawning` directly (§4.7 Restart one worker; §9, Illegal-but-needed
    /// transitions). Clears per-generation fields, preserving the supplied
    /// lifetime `restart_count`.
    pub fn reset_for_restart(&self, workers: &WorkerMap, id: WorkerId, restart_count: u32) {
        let mut workers = workers.lock();
        if let Some(worker) = workers.get_mut(&id) {
            if !Lifecycle::can_transition(worker.state, WorkerState::Spawning) {
                self.lifecycle.force_state(worker, WorkerState::Stopped);
            }
            self.lifecycle.transition(worker, WorkerState::Spawning);
            worker.pid = 0;
            worker.started_at_ms = None;
            worker.ready_at_ms = None;
            worker.last_exit_code = None;
            worker.last_exit_signal = None;
            worker.restart_count = restart_count;
        }
    }

    /// Install a one-shot stable-timer for `min_uptime`. On fire, if the
    /// worker is still `online`, resets its crash streak (§4.6). Replaces
    /// any existing stable-timer for this id (§5, Timer hygiene; §3 I4).
    pub fn install_stable_timer(self: &Arc<Self>, workers: &WorkerMap, id: WorkerId, min_uptime: Duration) {
        self.cancel_stable_timer(id);
        let this = self.clone();
        let workers = workers.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(min_uptime).await;
            let still_online = {
                let workers = workers.lock();
                matches!(workers.get(&id), Some(w) if w.state == WorkerState::Online)
            };
            if still_online {
                this.crash.lock().on_stable(id);
                let mut workers = workers.lock();
                if let Some(worker) = workers.get_mut(&id) {
                    worker.consecutive_crashes = 0;
                }
            }
            this.stable_timers.lock().remove(&id);
        });
        self.stable_timers.lock().insert(id, handle);
    }

    pub fn cancel_stable_timer(&self, id: WorkerId) {
        if let Some(handle) = self.stable_timers.lock().remove(&id) {
            handle.abort();
        }
    }

    pub fn cancel_backoff_timer(&self, id: WorkerId) {
        if let Some(handle) = self.backoff_timers.lock().remove(&id) {
            handle.abort();
        }
    }

    /// Record a worker's exit and decide its fate (§4.6).
    ///
    /// `on_restart_due` is invoked from the backoff timer's task once the
    /// delay elapses, but only if the worker is still `crashed` at that
    /// point — otherwise the generation has moved on and the timer is
    /// discarded silently (§5, Timer hygiene).
    pub fn on_exit<F>(
        self: &Arc<Self>,
        workers: &WorkerMap,
        id: WorkerId,
        exit_code: Option<i32>,
        exit_signal: Option<i32>,
        backoff: &BackoffConfig,
        on_restart_due: F,
    ) -> ExitOutcome
    where
        F: FnOnce(WorkerId) + Send + 'static,
    {
        self.cancel_stable_timer(id);
        let was_graceful = {
            let mut workers_guard = workers.lock();
            let Some(worker) = workers_guard.get_mut(&id) else { return ExitOutcome::Stopped };
            worker.last_exit_code = exit_code;
            worker.last_exit_signal = exit_signal;
            matches!(worker.state, WorkerState::Stopping | WorkerState::Draining)
        };

        if was_graceful {
            let mut workers_guard = workers.lock();
            if let Some(worker) = workers_guard.get_mut(&id) {
                self.lifecycle.transition(worker, WorkerState::Stopped);
            }
            return ExitOutcome::Stopped;
        }

        let now = self.clock.epoch_ms();
        {
            let mut workers_guard = workers.lock();
            if let Some(worker) = workers_guard.get_mut(&id) {
                self.lifecycle.transition(worker, WorkerState::Crashed);
                worker.last_crash_at_ms = Some(now);
                worker.consecutive_crashes += 1;
            }
        }

        let decision = self.crash.lock().on_crash(id, backoff);
        match decision {
            RestartDecision::GiveUp => {
                let mut workers_guard = workers.lock();
                if let Some(worker) = workers_guard.get_mut(&id) {
                    self.lifecycle.transition(worker, WorkerState::Errored);
                }
                ExitOutcome::GaveUp
            }
            RestartDecision::Restart => {
                self.cancel_backoff_timer(id);
                let delay = Duration::from_millis(self.crash.lock().get_delay(id));
                let workers_for_timer = workers.clone();
                let this = self.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let still_crashed = {
                        let workers_guard = workers_for_timer.lock();
                        matches!(workers_guard.get(&id), Some(w) if w.state == WorkerState::Crashed)
                    };
                    this.backoff_timers.lock().remove(&id);
                    if still_crashed {
                        on_restart_due(id);
                    } else {
                        warn!(worker_id = id, "discarding stale backoff timer for torn-down generation");
                    }
                });
                self.backoff_timers.lock().insert(id, handle);
                ExitOutcome::BackoffScheduled
            }
        }
    }

    /// Drain-and-stop one worker: no-op if terminal; otherwise drive
    /// `online → draining → stopping`, kill the child, and force the record
    /// to `stopped` regardless of the state the kill left it in (§4.6, §9).
    pub async fn drain_and_stop(
        &self,
        workers: &WorkerMap,
        id: WorkerId,
        process: &ProcessManager,
        signal: ShutdownSignal,
        kill_timeout: Duration,
    ) -> Option<KillResult> {
        self.cancel_backoff_timer(id);
        self.cancel_stable_timer(id);

        let (pid, should_kill) = {
            let mut workers_guard = workers.lock();
            let Some(worker) = workers_guard.get_mut(&id) else { return None };
            if worker.state.is_terminal() {
                return None;
            }
            if worker.state == WorkerState::Online {
                self.lifecycle.transition(worker, WorkerState::Draining);
                self.lifecycle.transition(worker, WorkerState::Stopping);
            }
            (worker.pid, true)
        };

        let result = if should_kill { Some(process.kill(pid, signal, kill_timeout).await) } else { None };

        let mut workers_guard = workers.lock();
        if let Some(worker) = workers_guard.get_mut(&id) {
            self.lifecycle.force_state(worker, WorkerState::Stopped);
        }
        result
    }

    /// Cancel every pending timer and drain every non-terminal worker in
    /// parallel, forcing each to `stopped` (§4.6 "Stop all").
    pub async fn stop_all(
        self: &Arc<Self>,
        workers: &WorkerMap,
        process: &ProcessManager,
        signal: ShutdownSignal,
        kill_timeout: Duration,
    ) {
        let ids: Vec<WorkerId> = workers.lock().keys().copied().collect();
        for id in &ids {
            self.cancel_backoff_timer(*id);
            self.cancel_stable_timer(*id);
        }

        let mut tasks = tokio::task::JoinSet::new();
        for id in ids {
            let this = self.clone();
            let workers = workers.clone();
            let process = process.clone();
            tasks.spawn(async move {
                this.drain_and_stop(&workers, id, &process, signal, kill_timeout).await;
            });
        }
        while tasks.join_next().await.is_some() {}
    }

    pub fn can_transition(&self, from: WorkerState, to: WorkerState) -> bool {
        Lifecycle::can_transition(from, to)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
