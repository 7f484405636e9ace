// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the control-plane protocol: connect-per-request against
//! the daemon's Unix socket, one framed request out, one or more framed
//! responses back (§4.9, §6).

use crate::frame::{write_frame, FrameError, FrameReader};
use crate::types::{Command, Request, Response, StreamChunk};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;

/// Default deadline for a non-streaming round trip (§6).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not connect to daemon socket {path}: {source}")]
    Connect { path: PathBuf, #[source] source: std::io::Error },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("daemon closed the connection before responding")]
    NoResponse,
    #[error("malformed response from daemon: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("daemon rejected the request: {0}")]
    Rejected(String),
}

pub struct ControlClient {
    sock_path: PathBuf,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(sock_path: impl Into<PathBuf>) -> Self {
        Self { sock_path: sock_path.into(), timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connect(&self) -> Result<UnixStream, ClientError> {
        UnixStream::connect(&self.sock_path)
            .await
            .map_err(|source| ClientError::Connect { path: self.sock_path.clone(), source })
    }

    /// Send a single request and wait for its one response, applying the
    /// client-side timeout to the whole round trip.
    pub async fn send(&self, cmd: &str, args: Value) -> Result<Value, ClientError> {
        let request = Request::new(cmd, args);
        let fut = self.round_trip(&request);
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        }
    }

    async fn round_trip(&self, request: &Request) -> Result<Value, ClientError> {
        let mut stream = self.connect().await?;
        write_frame(&mut stream, request).await?;
        let mut reader = FrameReader::new(stream);
        let raw = reader.next_object().await?.ok_or(ClientError::NoResponse)?;
        let response: Response = serde_json::from_value(raw)?;
        if response.ok {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(ClientError::Rejected(response.error.unwrap_or_else(|| "unknown error".into())))
        }
    }

    /// Send a streaming request (`logs`) and invoke `on_chunk` for every
    /// chunk until the daemon marks the stream done. No per-request
    /// timeout is applied once the stream has started: a live tail is
    /// expected to sit open indefinitely.
    pub async fn send_stream<F>(&self, cmd: &str, args: Value, mut on_chunk: F) -> Result<(), ClientError>
    where
        F: FnMut(Value),
    {
        let request = Request::new(cmd, args);
        let mut stream = tokio::time::timeout(self.timeout, self.connect()).await.map_err(|_| ClientError::Timeout(self.timeout))??;
        write_frame(&mut stream, &request).await?;
        let mut reader = FrameReader::new(stream);
        loop {
            let raw = reader.next_object().await?.ok_or(ClientError::NoResponse)?;
            if raw.get("stream").is_none() {
                let response: Response = serde_json::from_value(raw)?;
                return if response.ok {
                    Ok(())
                } else {
                    Err(ClientError::Rejected(response.error.unwrap_or_else(|| "unknown error".into())))
                };
            }
            let chunk: StreamChunk = serde_json::from_value(raw)?;
            if chunk.is_final() {
                return Ok(());
            }
            on_chunk(chunk.data);
        }
    }
}

/// Build a [`Request`] from a typed [`Command`], the inverse of
/// `Command::try_from(&Request)` on the daemon side.
pub fn request_for(command: &Command) -> Request {
    use serde_json::json;
    match command {
        Command::List => Request::new("list", json!({})),
        Command::Status { name } => Request::new("status", json!({"name": name})),
        Command::Start { name } => Request::new("start", json!({"name": name})),
        Command::Stop { name } => Request::new("stop", json!({"name": name})),
        Command::Restart { name } => Request::new("restart", json!({"name": name})),
        Command::Reload { name } => Request::new("reload", json!({"name": name})),
        Command::Delete { name } => Request::new("delete", json!({"name": name})),
        Command::Metrics => Request::new("metrics", json!({})),
        Command::Logs { name, lines } => Request::new("logs", json!({"name": name, "lines": lines})),
        Command::Ping => Request::new("ping", json!({})),
        Command::Dump => Request::new("dump", json!({})),
        Command::KillDaemon => Request::new("kill-daemon", json!({})),
    }
}

pub fn socket_path_under(runtime_dir: &Path) -> PathBuf {
    runtime_dir.join("fleetwatch.sock")
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
