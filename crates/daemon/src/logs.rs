// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory ring buffer of recent stdout/stderr lines per app, backing the
//! `logs` control command. File writing/rotation is an external collaborator
//! and out of scope (§1, §6).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

const DEFAULT_CAPACITY: usize = 2_000;

#[derive(Clone)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self { lines: Arc::new(Mutex::new(VecDeque::new())), capacity: DEFAULT_CAPACITY }
    }

    pub fn push(&self, worker_id: u32, stream: &str, line: &str) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(format!("[worker {worker_id}] [{stream}] {line}"));
    }

    /// Most recent `count` lines (or all buffered lines if `count` is `None`).
    pub fn tail(&self, count: Option<usize>) -> Vec<String> {
        let lines = self.lines.lock();
        match count {
            Some(n) if n < lines.len() => lines.iter().skip(lines.len() - n).cloned().collect(),
            _ => lines.iter().cloned().collect(),
        }
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
