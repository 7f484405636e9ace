// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared proptest strategies, gated behind `test-support` so other crates'
//! dev-dependencies can reuse them instead of re-deriving arbitrary
//! `WorkerState` coverage.

use proptest::prelude::*;

use crate::worker::WorkerState;

/// Any single worker state, uniformly weighted.
pub fn arb_worker_state() -> impl Strategy<Value = WorkerState> {
    prop_oneof![
        Just(WorkerState::Spawning),
        Just(WorkerState::Starting),
        Just(WorkerState::Online),
        Just(WorkerState::Draining),
        Just(WorkerState::Stopping),
        Just(WorkerState::Stopped),
        Just(WorkerState::Errored),
        Just(WorkerState::Crashed),
    ]
}

/// A `(from, to)` pair drawn independently from [`arb_worker_state`], for
/// exercising the transition table across its full domain rather than only
/// its hand-picked legal entries.
pub fn arb_transition_pair() -> impl Strategy<Value = (WorkerState, WorkerState)> {
    (arb_worker_state(), arb_worker_state())
}
