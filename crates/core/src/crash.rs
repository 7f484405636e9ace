// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-recovery bookkeeping: consecutive/windowed crash counts, the
//! exponential backoff curve, and the give-up decision (§4.2).
//!
//! One `CrashRecovery` instance is owned per app (not a global singleton),
//! so two apps' sliding windows never interact (§3, Ownership).

use crate::app::BackoffConfig;
use crate::clock::Clock;
use crate::worker::WorkerId;
use std::collections::HashMap;

/// Outcome of a crash decision (§4.2d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart,
    GiveUp,
}

/// Per-worker crash bookkeeping (§3, CrashBookkeeping).
#[derive(Debug, Clone, Copy, Default)]
pub struct CrashBookkeeping {
    pub consecutive_crashes: u32,
    pub window_start_ms: u64,
    pub restarts_in_window: u32,
    pub total_restarts: u32,
    pub next_restart_at_ms: u64,
    pub last_crash_at_ms: Option<u64>,
}

/// Tracks crash bookkeeping for every worker id of one app.
pub struct CrashRecovery<C: Clock> {
    clock: C,
    state: HashMap<WorkerId, CrashBookkeeping>,
}

impl<C: Clock> CrashRecovery<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, state: HashMap::new() }
    }

    /// Record a crash and decide whether to restart or give up (§4.2).
    ///
    /// Steps (a)-(d) execute atomically against this worker's entry: the
    /// window slides only when a crash occurs, so a quiescent worker never
    /// accrues free restart budget.
    pub fn on_crash(&mut self, id: WorkerId, cfg: &BackoffConfig) -> RestartDecision {
        let now = self.clock.epoch_ms();
        let entry = self.state.entry(id).or_default();

        // (a) slide the window if it has expired
        if entry.window_start_ms == 0 || now.saturating_sub(entry.window_start_ms) > cfg.window_ms {
            entry.window_start_ms = now;
            entry.restarts_in_window = 0;
        }

        // (b) bump counters
        entry.consecutive_crashes += 1;
        entry.restarts_in_window += 1;
        entry.total_restarts += 1;
        entry.last_crash_at_ms = Some(now);

        // (c) compute backoff delay and store next_restart_at
        let exponent = entry.consecutive_crashes.saturating_sub(1);
        let raw_delay = cfg.initial_ms as f64 * cfg.multiplier.powi(exponent as i32);
        let delay_ms = raw_delay.min(cfg.max_ms as f64).max(0.0) as u64;
        entry.next_restart_at_ms = now + delay_ms;

        // (d) decide
        if entry.restarts_in_window > cfg.max_restarts {
            RestartDecision::GiveUp
        } else {
            RestartDecision::Restart
        }
    }

    /// A worker survived its min-uptime: reset its consecutive-crash streak
    /// (but not the sliding window), giving it a fresh backoff curve (§4.2).
    pub fn on_stable(&mut self, id: WorkerId) {
        if let Some(entry) = self.state.get_mut(&id) {
            entry.consecutive_crashes = 0;
        }
    }

    /// Delay remaining until the next scheduled restart, clamped to zero.
    pub fn get_delay(&self, id: WorkerId) -> u64 {
        let Some(entry) = self.state.get(&id) else { return 0 };
        let now = self.clock.epoch_ms();
        entry.next_restart_at_ms.saturating_sub(now)
    }

    /// Clear bookkeeping for a single worker id.
    pub fn reset(&mut self, id: WorkerId) {
        self.state.remove(&id);
    }

    /// Clear bookkeeping for every worker id of this app.
    pub fn reset_all(&mut self) {
        self.state.clear();
    }

    /// Inspect bookkeeping for a worker id (for status views / tests).
    pub fn bookkeeping(&self, id: WorkerId) -> Option<&CrashBookkeeping> {
        self.state.get(&id)
    }
}

#[cfg(test)]
#[path = "crash_tests.rs"]
mod tests;
