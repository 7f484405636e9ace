// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane server: accepts connections on the daemon's Unix socket and
//! dispatches framed requests to [`Master`] methods (§4.9).

use std::sync::Arc;

use fw_core::{Clock, RequestId};
use fw_wire::{write_frame, Command, FrameError, Request, Response, StreamChunk, ALL_APPS};
use serde_json::json;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::env;
use crate::master::{Master, MasterError};

#[derive(Debug, Error)]
pub enum ControlServerError {
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Accepts control-plane connections and dispatches each one against a
/// shared [`Master`] (§4.9).
pub struct ControlServer<C: Clock> {
    master: Arc<Master<C>>,
    shutdown: Arc<Notify>,
}

impl<C: Clock + 'static> ControlServer<C> {
    pub fn new(master: Arc<Master<C>>, shutdown: Arc<Notify>) -> Self {
        Self { master, shutdown }
    }

    /// Accept connections until `shutdown` is signaled.
    pub async fn run(self, listener: UnixListener) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let master = self.master.clone();
                            let shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, master, shutdown).await {
                                    warn!("control connection error: {e}");
                                }
                            });
                        }
                        Err(e) => error!("control accept error: {e}"),
                    }
                }
            }
        }
    }
}

async fn handle_connection<C: Clock + 'static>(
    stream: UnixStream,
    master: Arc<Master<C>>,
    shutdown: Arc<Notify>,
) -> Result<(), ControlServerError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = fw_wire::FrameReader::new(read_half);

    while let Some(value) = reader.next_object().await? {
        let Ok(request) = serde_json::from_value::<Request>(value) else { continue };
        let id = request.id.clone();

        match Command::try_from(&request) {
            Ok(Command::Logs { name, lines }) => {
                stream_logs(&mut write_half, id, &master, &name, lines).await?;
            }
            Ok(command) => {
                let response = dispatch(&master, &shutdown, command, id).await;
                write_frame(&mut write_half, &response).await?;
            }
            Err(e) => {
                write_frame(&mut write_half, &Response::err(id, e.to_string())).await?;
            }
        }
    }
    Ok(())
}

/// Route one decoded [`Command`] to a `Master` method and build the response
/// (§4.9). `logs` is handled separately by the caller as a streaming reply.
async fn dispatch<C: Clock + 'static>(
    master: &Arc<Master<C>>,
    shutdown: &Arc<Notify>,
    command: Command,
    id: RequestId,
) -> Response {
    match command {
        Command::List => Response::ok(id, json!(master.list_apps())),
        Command::Status { name } => match master.get_app_status(&name) {
            Some(status) => Response::ok(id, json!(status)),
            None => Response::err(id, format!("app `{name}` not found")),
        },
        Command::Start { name } => result_response(id, master.start_app_by_name(&name).await),
        Command::Stop { name } if name == ALL_APPS => {
            bulk_response(id, all_apps(master), |n| { let m = master.clone(); async move { m.stop_app(&n).await } }).await
        }
        Command::Stop { name } => result_response(id, master.stop_app(&name).await),
        Command::Restart { name } => result_response(id, master.restart_app(&name).await),
        Command::Reload { name } if name == ALL_APPS => {
            bulk_response(id, all_apps(master), |n| { let m = master.clone(); async move { m.reload_app(&n).await } }).await
        }
        Command::Reload { name } => result_response(id, master.reload_app(&name).await),
        Command::Delete { name } => result_response(id, master.delete_app(&name).await),
        Command::Metrics => Response::ok(id, json!(master.list_apps())),
        Command::Ping => Response::ok(id, json!({"pong": true, "ts": master.clock_epoch_ms()})),
        Command::Dump => Response::ok(id, json!(master.dump())),
        Command::KillDaemon => {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(env::shutdown_flush_delay()).await;
                shutdown.notify_waiters();
            });
            Response::ok(id, json!({"shutting_down": true}))
        }
        Command::Logs { .. } => unreachable!("logs is dispatched as a stream by the caller"),
    }
}

fn all_apps<C: Clock + 'static>(master: &Arc<Master<C>>) -> Vec<String> {
    master.list_apps().into_iter().map(|a| a.name).collect()
}

/// Run `op` over every name in `names` in parallel, folding per-app errors
/// into one combined error response (§6, the `all` sentinel).
async fn bulk_response<F, Fut>(id: RequestId, names: Vec<String>, op: F) -> Response
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<(), MasterError>> + Send + 'static,
{
    let mut tasks = tokio::task::JoinSet::new();
    for name in names {
        let fut = op(name.clone());
        tasks.spawn(async move { (name, fut.await) });
    }
    let mut errors = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok((name, Err(e))) = result {
            errors.push(format!("{name}: {e}"));
        }
    }
    if errors.is_empty() {
        Response::ok(id, json!({}))
    } else {
        Response::err(id, errors.join("; "))
    }
}

fn result_response(id: RequestId, result: Result<(), MasterError>) -> Response {
    match result {
        Ok(()) => Response::ok(id, json!({})),
        Err(e) => Response::err(id, e.to_string()),
    }
}

/// Stream `tail_logs` line-by-line as [`StreamChunk`]s, then a final
/// `Response` (so an unknown app still produces a clean error for the CLI).
async fn stream_logs<C: Clock + 'static, W>(
    writer: &mut W,
    id: RequestId,
    master: &Arc<Master<C>>,
    name: &str,
    lines: Option<usize>,
) -> Result<(), ControlServerError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let Some(tail) = master.tail_logs(name, lines) else {
        write_frame(writer, &Response::err(id, format!("app `{name}` not found"))).await?;
        return Ok(());
    };
    for line in tail {
        write_frame(writer, &StreamChunk::chunk(id.clone(), json!(line))).await?;
    }
    write_frame(writer, &StreamChunk::end(id)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
