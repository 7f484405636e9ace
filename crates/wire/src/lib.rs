// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane wire protocol: newline-delimited JSON framing plus the
//! request/response/stream-chunk message shapes exchanged between
//! `fleetwatch` (client) and `fleetwatchd` (server) over a local socket
//! (§4.9).

pub mod client;
pub mod frame;
pub mod types;

pub use client::{request_for, socket_path_under, ClientError, ControlClient, DEFAULT_TIMEOUT};
pub use frame::{encode_line, write_frame, FrameError, FrameReader};
pub use types::{Command, CommandError, Request, Response, StreamChunk, ALL_APPS};
