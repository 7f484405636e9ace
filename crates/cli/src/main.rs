// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fleetwatch`: a thin client over the daemon's control socket (§6).
//!
//! Every subcommand maps 1:1 to a control-plane command; this binary owns
//! no process-management logic itself.

mod exit_error;
mod output;

use std::io::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use fw_wire::ControlClient;
use output::{print_app_status, print_app_table, print_value, OutputFormat};
use serde_json::json;

#[derive(Parser)]
#[command(name = "fleetwatch", version, about = "Control the fleetwatch supervisor daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the daemon's control socket (defaults to the standard runtime directory).
    #[arg(long, global = true)]
    socket: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every declared app and its derived state.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one app's per-worker detail.
    Status {
        name: String,
    },
    /// (Re)spawn a declared app that is currently stopped.
    Start {
        name: String,
    },
    /// Stop an app, or `all` apps.
    Stop {
        name: String,
    },
    /// Stop and respawn an app fresh.
    Restart {
        name: String,
    },
    /// Zero-downtime rolling replacement of an app's workers, or `all` apps.
    Reload {
        name: String,
    },
    /// Stop and forget an app.
    Delete {
        name: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },
    /// Resource usage across every worker of every app.
    Metrics {
        #[arg(long)]
        json: bool,
    },
    /// Tail an app's combined stdout/stderr log buffer.
    Logs {
        name: String,
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
    /// Check that the daemon is reachable.
    Ping,
    /// Dump the daemon's full in-memory state.
    Dump,
    /// Ask the daemon to shut down.
    KillDaemon,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.code);
    }
}

fn client_for(socket: Option<PathBuf>) -> Result<ControlClient, ExitError> {
    let path = socket.unwrap_or_else(|| fw_wire::socket_path_under(&default_runtime_dir()));
    Ok(ControlClient::new(path))
}

/// Mirrors the daemon's own runtime-directory resolution (`FLEETWATCH_RUNTIME_DIR` >
/// `XDG_RUNTIME_DIR/fleetwatch` > the state directory), so the client finds the
/// same socket the daemon bound without depending on the daemon crate.
fn default_runtime_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FLEETWATCH_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(xdg).join("fleetwatch");
    }
    if let Ok(dir) = std::env::var("FLEETWATCH_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("fleetwatch");
    }
    dirs::home_dir().map(|home| home.join(".local/state/fleetwatch")).unwrap_or_else(|| PathBuf::from("/tmp/fleetwatch"))
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let client = client_for(cli.socket)?;
    match cli.command {
        Commands::List { json } => {
            let data = client.send("list", json!({})).await?;
            let format = if json { OutputFormat::Json } else { OutputFormat::Text };
            print_value(&data, format, |v| print_app_table(v.as_array().map(Vec::as_slice).unwrap_or(&[])));
        }
        Commands::Status { name } => {
            let data = client.send("status", json!({"name": name})).await?;
            print_value(&data, OutputFormat::Text, print_app_status);
        }
        Commands::Start { name } => {
            client.send("start", json!({"name": name})).await?;
            println!("started");
        }
        Commands::Stop { name } => {
            client.send("stop", json!({"name": name})).await?;
            println!("stopped");
        }
        Commands::Restart { name } => {
            client.send("restart", json!({"name": name})).await?;
            println!("restarted");
        }
        Commands::Reload { name } => {
            client.send("reload", json!({"name": name})).await?;
            println!("reloaded");
        }
        Commands::Delete { name, force } => {
            if !force && !confirm(&format!("delete app `{name}`?")) {
                println!("aborted");
                return Ok(());
            }
            client.send("delete", json!({"name": name})).await?;
            println!("deleted");
        }
        Commands::Metrics { json: as_json } => {
            let data = client.send("metrics", json!({})).await?;
            let format = if as_json { OutputFormat::Json } else { OutputFormat::Text };
            print_value(&data, format, |v| print_app_table(v.as_array().map(Vec::as_slice).unwrap_or(&[])));
        }
        Commands::Logs { name, lines } => {
            client
                .send_stream("logs", json!({"name": name, "lines": lines}), |line| {
                    if let Some(text) = line.as_str() {
                        println!("{text}");
                    }
                })
                .await?;
        }
        Commands::Ping => {
            client.send("ping", json!({})).await?;
            println!("pong");
        }
        Commands::Dump => {
            let data = client.send("dump", json!({})).await?;
            println!("{}", serde_json::to_string_pretty(&data).unwrap_or_else(|_| "null".to_string()));
        }
        Commands::KillDaemon => {
            client.send("kill-daemon", json!({})).await?;
            println!("shutting down");
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
