// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker HTTP health probing and heartbeat staleness monitoring (§4.4).

use fw_core::{Clock, HealthCheckConfig, HeartbeatConfig, WorkerId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Observer callback invoked exactly once when a worker crosses the
/// unhealthy threshold, or when its heartbeat goes stale.
pub type UnhealthyObserver = Arc<dyn Fn(WorkerId, &str) + Send + Sync>;

struct ProbeState {
    failures: u32,
    task: JoinHandle<()>,
}

struct HeartbeatState {
    last_beat_ms: u64,
    task: JoinHandle<()>,
}

/// Owns the repeating HTTP-probe and heartbeat-monitor timers for every
/// worker of one app.
pub struct HealthChecker<C: Clock> {
    clock: C,
    probes: Arc<Mutex<HashMap<WorkerId, ProbeState>>>,
    heartbeats: Arc<Mutex<HashMap<WorkerId, HeartbeatState>>>,
}

impl<C: Clock + 'static> HealthChecker<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, probes: Arc::new(Mutex::new(HashMap::new())), heartbeats: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Install a repeating HTTP probe at `cfg.interval_ms` (§4.4). Overwrites
    /// any existing probe for this worker id (re-arming after `stop_checking`).
    pub fn start_checking(&self, id: WorkerId, port: u16, cfg: HealthCheckConfig, on_unhealthy: UnhealthyObserver) {
        self.stop_checking(id);
        let probes = self.probes.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(cfg.interval_ms));
            ticker.tick().await; // first tick fires immediately; skip so the probe starts after one interval
            loop {
                ticker.tick().await;
                let ok = probe_once(port, &cfg.path, Duration::from_millis(cfg.timeout_ms)).await;
                let mut probes = probes.lock();
                let Some(state) = probes.get_mut(&id) else { return };
                if ok {
                    state.failures = 0;
                } else {
                    let was_below = state.failures < cfg.unhealthy_threshold;
                    state.failures = (state.failures + 1).min(cfg.unhealthy_threshold);
                    if was_below && state.failures == cfg.unhealthy_threshold {
                        on_unhealthy(id, "unhealthy: probe failed or timed out");
                    }
                }
            }
        });
        self.probes.lock().insert(id, ProbeState { failures: 0, task });
    }

    pub fn stop_checking(&self, id: WorkerId) {
        if let Some(state) = self.probes.lock().remove(&id) {
            state.task.abort();
        }
    }

    pub fn failure_count(&self, id: WorkerId) -> u32 {
        self.probes.lock().get(&id).map(|s| s.failures).unwrap_or(0)
    }

    /// Seed the last-heartbeat timestamp and install a repeating staleness
    /// monitor at `cfg.interval_ms` (§4.4).
    pub fn start_heartbeat_monitor(&self, id: WorkerId, cfg: HeartbeatConfig, on_stale: UnhealthyObserver) {
        self.stop_heartbeat_monitor(id);
        let heartbeats = self.heartbeats.clone();
        let clock = self.clock.clone();
        let now = clock.epoch_ms();
        let stale_after = cfg.interval_ms.saturating_mul(cfg.miss_threshold as u64);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(cfg.interval_ms));
            loop {
                ticker.tick().await;
                let last = {
                    let heartbeats = heartbeats.lock();
                    let Some(state) = heartbeats.get(&id) else { return };
                    state.last_beat_ms
                };
                if clock.epoch_ms().saturating_sub(last) >= stale_after {
                    on_stale(id, "heartbeat stale");
                }
            }
        });
        self.heartbeats.lock().insert(id, HeartbeatState { last_beat_ms: now, task });
    }

    pub fn stop_heartbeat_monitor(&self, id: WorkerId) {
        if let Some(state) = self.heartbeats.lock().remove(&id) {
            state.task.abort();
        }
    }

    pub fn on_heartbeat(&self, id: WorkerId) {
        let now = self.clock.epoch_ms();
        if let Some(state) = self.heartbeats.lock().get_mut(&id) {
            state.last_beat_ms = now;
        }
    }

    pub fn last_heartbeat_ms(&self, id: WorkerId) -> Option<u64> {
        self.heartbeats.lock().get(&id).map(|s| s.last_beat_ms)
    }
}

/// A single minimal HTTP/1.1 GET, returning whether the response's status
/// line was 2xx within `deadline` (§4.4).
async fn probe_once(port: u16, path: &str, deadline: Duration) -> bool {
    timeout(deadline, probe_inner(port, path)).await.unwrap_or(false)
}

async fn probe_inner(port: u16, path: &str) -> bool {
    let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)).await else { return false };
    let request = format!(
        "GET {path} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n"
    );
    if stream.write_all(request.as_bytes()).await.is_err() {
        return false;
    }
    let mut buf = Vec::with_capacity(64);
    let mut chunk = [0u8; 64];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() >= 12 || buf.contains(&b'\n') {
                    break;
                }
            }
            Err(_) => return false,
        }
    }
    is_2xx_status_line(&buf)
}

fn is_2xx_status_line(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(line) = text.lines().next() else { return false };
    let mut parts = line.split_whitespace();
    let Some(_version) = parts.next() else { return false };
    let Some(code) = parts.next() else { return false };
    code.starts_with('2') && code.len() == 3
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
