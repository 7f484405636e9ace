// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level message shapes for the control-plane protocol (§4.9).

use fw_core::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// `{id, cmd, args}` as sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub cmd: String,
    #[serde(default = "default_args")]
    pub args: Value,
}

fn default_args() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Request {
    pub fn new(cmd: impl Into<String>, args: Value) -> Self {
        Self { id: RequestId::new(), cmd: cmd.into(), args }
    }
}

/// `{id, ok, data?, error?}` as sent back by the daemon once a command
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(id: RequestId, data: Value) -> Self {
        Self { id, ok: true, data: Some(data), error: None }
    }

    pub fn err(id: RequestId, message: impl Into<String>) -> Self {
        Self { id, ok: false, data: None, error: Some(message.into()) }
    }
}

/// `{id, stream: true, data, done?}` — one line per chunk of a streaming
/// command such as `logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: RequestId,
    #[serde(default = "stream_true")]
    pub stream: bool,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

fn stream_true() -> bool {
    true
}

impl StreamChunk {
    pub fn chunk(id: RequestId, data: Value) -> Self {
        Self { id, stream: true, data, done: None }
    }

    pub fn end(id: RequestId) -> Self {
        Self { id, stream: true, data: Value::Null, done: Some(true) }
    }

    pub fn is_final(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// Name of the sentinel app target accepted by `stop` and `reload` (§6).
pub const ALL_APPS: &str = "all";

/// Typed view over a [`Request`], used by daemon-side dispatch so command
/// handling reads as a match over variants instead of string comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    List,
    Status { name: String },
    Start { name: String },
    Stop { name: String },
    Restart { name: String },
    Reload { name: String },
    Delete { name: String },
    Metrics,
    Logs { name: String, lines: Option<usize> },
    Ping,
    Dump,
    KillDaemon,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("missing required field {0:?}")]
    MissingField(&'static str),
    #[error("field {0:?} has the wrong type")]
    WrongType(&'static str),
}

impl TryFrom<&Request> for Command {
    type Error = CommandError;

    fn try_from(req: &Request) -> Result<Self, Self::Error> {
        let name = || field_str(&req.args, "name");
        match req.cmd.as_str() {
            "list" => Ok(Command::List),
            "status" => Ok(Command::Status { name: name()? }),
            "start" => Ok(Command::Start { name: name()? }),
            "stop" => Ok(Command::Stop { name: name()? }),
            "restart" => Ok(Command::Restart { name: name()? }),
            "reload" => Ok(Command::Reload { name: name()? }),
            "delete" => Ok(Command::Delete { name: name()? }),
            "metrics" => Ok(Command::Metrics),
            "logs" => Ok(Command::Logs {
                name: name()?,
                lines: req.args.get("lines").and_then(Value::as_u64).map(|n| n as usize),
            }),
            "ping" => Ok(Command::Ping),
            "dump" => Ok(Command::Dump),
            "kill-daemon" => Ok(Command::KillDaemon),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn field_str(args: &Value, field: &'static str) -> Result<String, CommandError> {
    args.get(field)
        .ok_or(CommandError::MissingField(field))?
        .as_str()
        .ok_or(CommandError::WrongType(field))
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
