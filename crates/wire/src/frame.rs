// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-by-newline JSON framing (§4.9).
//!
//! Each message is a UTF-8 JSON object on one line terminated by a single
//! line-feed. A reader maintains a growing byte buffer and emits one decoded
//! object per line boundary, silently discarding blank lines or lines that
//! fail to parse or do not decode to a JSON object.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    Closed,
}

/// Encode one value as a newline-terminated JSON line.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, FrameError> {
    let mut buf = serde_json::to_vec(value).map_err(|e| FrameError::Io(e.into()))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write one framed message to `writer`.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = encode_line(value)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Incremental newline-delimited JSON-object reader over any `AsyncRead`.
///
/// Maintains its own byte buffer so callers can feed arbitrarily sized
/// reads from the underlying socket; a line is only decoded once a `\n`
/// has actually arrived.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: Vec::new() }
    }

    /// Read the next valid JSON object from the stream, skipping blank and
    /// malformed lines. Returns `Ok(None)` when the peer closes the
    /// connection without a trailing newline (a normal end, per §4.9).
    pub async fn next_object(&mut self) -> Result<Option<Value>, FrameError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = &line[..line.len() - 1]; // drop the '\n'
                if let Some(value) = decode_line(line) {
                    return Ok(Some(value));
                }
                continue; // blank or malformed: silently skip
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.iter().all(|b| b.is_ascii_whitespace()) {
                    return Ok(None);
                }
                // Trailing partial line with no newline: treat like EOF-terminated line.
                let remaining = std::mem::take(&mut self.buf);
                return Ok(decode_line(&remaining));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

fn decode_line(line: &[u8]) -> Option<Value> {
    let trimmed = trim_ascii(line);
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_slice::<Value>(trimmed) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while matches!(bytes.first(), Some(b) if b.is_ascii_whitespace()) {
        bytes = &bytes[1..];
    }
    while matches!(bytes.last(), Some(b) if b.is_ascii_whitespace()) {
        bytes = &bytes[..bytes.len() - 1];
    }
    bytes
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
