// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::worker::Worker;
use parking_lot::Mutex;
use std::sync::Arc;

const ALL_STATES: &[WorkerState] = &[
    WorkerState::Spawning,
    WorkerState::Starting,
    WorkerState::Online,
    WorkerState::Draining,
    WorkerState::Stopping,
    WorkerState::Stopped,
    WorkerState::Errored,
    WorkerState::Crashed,
];

#[test]
fn listeners_fire_only_on_success_in_registration_order() {
    let mut lifecycle = Lifecycle::new();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let log1 = log.clone();
    lifecycle.on_change(Box::new(move |_, _, _| log1.lock().push("first")));
    let log2 = log.clone();
    lifecycle.on_change(Box::new(move |_, _, _| log2.lock().push("second")));

    let mut worker = Worker::new(1, 0);
    // illegal: spawning -> online
    assert!(!lifecycle.transition(&mut worker, WorkerState::Online));
    assert!(log.lock().is_empty());

    // legal: spawning -> starting
    assert!(lifecycle.transition(&mut worker, WorkerState::Starting));
    assert_eq!(*log.lock(), vec!["first", "second"]);
}

#[test]
fn listener_receives_worker_id_and_from_to() {
    let mut lifecycle = Lifecycle::new();
    let seen: Arc<Mutex<Option<(u32, WorkerState, WorkerState)>>> = Arc::new(Mutex::new(None));
    let seen2 = seen.clone();
    lifecycle.on_change(Box::new(move |id, from, to| *seen2.lock() = Some((id, from, to))));

    let mut worker = Worker::new(42, 0);
    lifecycle.transition(&mut worker, WorkerState::Starting);

    assert_eq!(*seen.lock(), Some((42, WorkerState::Spawning, WorkerState::Starting)));
}

#[test]
fn force_state_bypasses_the_table_and_still_notifies() {
    let mut lifecycle = Lifecycle::new();
    let fired = Arc::new(Mutex::new(false));
    let fired2 = fired.clone();
    lifecycle.on_change(Box::new(move |_, _, _| *fired2.lock() = true));

    let mut worker = Worker::new(1, 0);
    // spawning -> stopped is illegal in the healthy table
    assert!(!Lifecycle::can_transition(WorkerState::Spawning, WorkerState::Stopped));
    lifecycle.force_state(&mut worker, WorkerState::Stopped);

    assert_eq!(worker.state, WorkerState::Stopped);
    assert!(*fired.lock());
}

#[test]
fn force_state_to_same_state_does_not_notify() {
    let mut lifecycle = Lifecycle::new();
    let count = Arc::new(Mutex::new(0));
    let count2 = count.clone();
    lifecycle.on_change(Box::new(move |_, _, _| *count2.lock() += 1));

    let mut worker = Worker::new(1, 0);
    lifecycle.force_state(&mut worker, WorkerState::Spawning);
    assert_eq!(*count.lock(), 0);
}

#[yare::parameterized(
    spawning_to_starting = { WorkerState::Spawning, WorkerState::Starting, true },
    starting_to_online = { WorkerState::Starting, WorkerState::Online, true },
    starting_to_errored = { WorkerState::Starting, WorkerState::Errored, true },
    starting_to_crashed = { WorkerState::Starting, WorkerState::Crashed, true },
    online_to_draining = { WorkerState::Online, WorkerState::Draining, true },
    online_to_crashed = { WorkerState::Online, WorkerState::Crashed, true },
    draining_to_stopping = { WorkerState::Draining, WorkerState::Stopping, true },
    draining_to_crashed = { WorkerState::Draining, WorkerState::Crashed, true },
    stopping_to_stopped = { WorkerState::Stopping, WorkerState::Stopped, true },
    stopping_to_crashed = { WorkerState::Stopping, WorkerState::Crashed, true },
    stopped_to_spawning = { WorkerState::Stopped, WorkerState::Spawning, true },
    crashed_to_spawning = { WorkerState::Crashed, WorkerState::Spawning, true },
    crashed_to_errored = { WorkerState::Crashed, WorkerState::Errored, true },
    errored_to_spawning = { WorkerState::Errored, WorkerState::Spawning, true },
    online_to_stopped_illegal = { WorkerState::Online, WorkerState::Stopped, false },
    draining_to_online_illegal = { WorkerState::Draining, WorkerState::Online, false },
)]
fn spec_transition_table(from: WorkerState, to: WorkerState, expected: bool) {
    assert_eq!(Lifecycle::can_transition(from, to), expected);
}

proptest::proptest! {
    /// `transition` mutates the worker's state if and only if the table
    /// says the pair is legal, over the full 8x8 state domain rather than
    /// only the hand-picked pairs above.
    #[test]
    fn transition_obeys_table_exhaustively(
        from in proptest::sample::select(ALL_STATES),
        to in proptest::sample::select(ALL_STATES),
    ) {
        let lifecycle = Lifecycle::new();
        let mut worker = Worker::new(1, 0);
        lifecycle.force_state(&mut worker, from);

        let legal = Lifecycle::can_transition(from, to);
        let changed = lifecycle.transition(&mut worker, to);

        proptest::prop_assert_eq!(changed, legal);
        proptest::prop_assert_eq!(worker.state, if legal { to } else { from });
    }

    /// No state transitions to itself (§3: the table is a set of distinct pairs).
    #[test]
    fn no_state_ever_transitions_to_itself(state in proptest::sample::select(ALL_STATES)) {
        proptest::prop_assert!(!Lifecycle::can_transition(state, state));
    }
}
