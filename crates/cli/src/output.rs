// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text/JSON rendering shared by every command (§6 CLI surface).

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Print a value either as pretty JSON or by handing it to `render_text`.
pub fn print_value<T: Serialize>(value: &T, format: OutputFormat, render_text: impl FnOnce(&T)) {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string()));
        }
        OutputFormat::Text => render_text(value),
    }
}

/// Render the `list`/`metrics` table: one row per app.
pub fn print_app_table(apps: &[serde_json::Value]) {
    if apps.is_empty() {
        println!("no apps");
        return;
    }
    println!("{:<20} {:<10} {:<10} {}", "NAME", "STATE", "WORKERS", "STARTED");
    for app in apps {
        let name = app["name"].as_str().unwrap_or("-");
        let state = app["state"].as_str().unwrap_or("-");
        let workers = app["workers"].as_array().map(|w| w.len()).unwrap_or(0);
        let started = app["started_at_ms"].as_u64().map(|ms| ms.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{name:<20} {state:<10} {workers:<10} {started}");
    }
}

/// Render `status` for one app: the table header plus a line per worker.
pub fn print_app_status(status: &serde_json::Value) {
    let name = status["name"].as_str().unwrap_or("-");
    let state = status["state"].as_str().unwrap_or("-");
    println!("{name} — {state}");
    println!("{:<8} {:<10} {:<8} {:<10} {}", "WORKER", "STATE", "PID", "RESTARTS", "CRASHES");
    for worker in status["workers"].as_array().into_iter().flatten() {
        let id = worker["id"].as_u64().unwrap_or(0);
        let wstate = worker["state"].as_str().unwrap_or("-");
        let pid = worker["pid"].as_u64().unwrap_or(0);
        let restarts = worker["restart_count"].as_u64().unwrap_or(0);
        let crashes = worker["consecutive_crashes"].as_u64().unwrap_or(0);
        println!("{id:<8} {wstate:<10} {pid:<8} {restarts:<10} {crashes}");
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
