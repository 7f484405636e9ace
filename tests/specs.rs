// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavioral specifications for the fleetwatch supervisor.
//!
//! Black-box: these tests spawn the real `fleetwatchd`/`fleetwatch`
//! binaries and assert on stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/cli/lifecycle.rs"]
mod cli_lifecycle;
#[path = "specs/cli/crash_backoff.rs"]
mod cli_crash_backoff;
#[path = "specs/cli/control_roundtrip.rs"]
mod cli_control_roundtrip;
#[path = "specs/cli/errors.rs"]
mod cli_errors;
