// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batch-oriented rolling replacement coordinator (§4.5).

use fw_core::{ReloadConfig, Worker, WorkerState};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{sleep, Instant};

/// Poll interval while waiting for replacements to reach `online` (§4.5b).
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run one rolling-reload pass over `workers`, partitioning into batches of
/// `cfg.batch_size` and, per batch: spawn replacements, wait (bounded) for
/// them to come online, then drain-and-stop the old workers (§4.5).
///
/// `spawn_and_track` returns the replacement worker's id given the old
/// worker being replaced. `is_online` inspects current state by id.
/// `drain_and_stop` tears down one old worker.
pub async fn reload<S, F1, O, D, F2>(
    workers: Vec<Worker>,
    cfg: &ReloadConfig,
    mut spawn_and_track: S,
    mut is_online: O,
    mut drain_and_stop: D,
) where
    S: FnMut(u32) -> F1,
    F1: Future<Output = u32>,
    O: FnMut(u32) -> WorkerState,
    D: FnMut(u32) -> F2,
    F2: Future<Output = ()> + Send + 'static,
{
    let batch_size = cfg.batch_size.max(1) as usize;
    let batches: Vec<&[Worker]> = workers.chunks(batch_size).collect();
    let batch_count = batches.len();

    for (i, batch) in batches.into_iter().enumerate() {
        let mut replacement_ids = Vec::with_capacity(batch.len());
        for old in batch {
            replacement_ids.push(spawn_and_track(old.id).await);
        }

        let deadline = Instant::now() + Duration::from_millis(cfg.ready_timeout_ms);
        loop {
            let all_online = replacement_ids.iter().all(|id| is_online(*id) == WorkerState::Online);
            if all_online || Instant::now() >= deadline {
                break;
            }
            sleep(READY_POLL_INTERVAL).await;
        }

        let mut stops = JoinSet::new();
        for old in batch {
            let id = old.id;
            stops.spawn(drain_and_stop(id));
        }
        while stops.join_next().await.is_some() {}

        let is_last = i + 1 == batch_count;
        if !is_last && cfg.batch_delay_ms > 0 {
            sleep(Duration::from_millis(cfg.batch_delay_ms)).await;
        }
    }
}

#[cfg(test)]
#[path = "reload_tests.rs"]
mod tests;
