// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and the closed set of lifecycle states (§3, §4.1).

use serde::{Deserialize, Serialize};

/// Stable integer id of a worker instance, monotonically assigned within its app.
pub type WorkerId = u32;

/// The closed set of states a worker can occupy.
///
/// See the transition table in [`crate::lifecycle::Lifecycle`]; this type only
/// carries the tags, not the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Spawning,
    Starting,
    Online,
    Draining,
    Stopping,
    Stopped,
    Errored,
    Crashed,
}

impl WorkerState {
    /// Terminal states have no live process and no pending timers.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Errored)
    }
}

crate::simple_display! {
    WorkerState {
        Spawning => "spawning",
        Starting => "starting",
        Online => "online",
        Draining => "draining",
        Stopping => "stopping",
        Stopped => "stopped",
        Errored => "errored",
        Crashed => "crashed",
    }
}

/// A resource sample reported by a worker's `metrics` message (§4.6).
///
/// `cpu_percent` is left at zero by the handler that records this sample;
/// it is the aggregator's job to derive a rate from successive absolute
/// `user_ms`/`system_ms` counters (§9, CPU metric semantics).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub memory_bytes: u64,
    pub user_ms: u64,
    pub system_ms: u64,
    pub cpu_percent: f64,
}

/// One OS process instance of an app (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub pid: u32,
    pub state: WorkerState,
    pub started_at_ms: Option<u64>,
    pub ready_at_ms: Option<u64>,
    /// Lifetime restart count, preserved across generations of this id.
    pub restart_count: u32,
    pub consecutive_crashes: u32,
    pub last_crash_at_ms: Option<u64>,
    pub last_exit_code: Option<i32>,
    pub last_exit_signal: Option<i32>,
    pub last_sample: Option<ResourceSample>,
}

impl Worker {
    /// Create a fresh worker record for a new generation of `id`, preserving
    /// the lifetime `restart_count` of the previous generation (if any).
    pub fn new(id: WorkerId, restart_count: u32) -> Self {
        Self {
            id,
            pid: 0,
            state: WorkerState::Spawning,
            started_at_ms: None,
            ready_at_ms: None,
            restart_count,
            consecutive_crashes: 0,
            last_crash_at_ms: None,
            last_exit_code: None,
            last_exit_signal: None,
            last_sample: None,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
