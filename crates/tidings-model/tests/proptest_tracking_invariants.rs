#![forbid(unsafe_code)]

//! Property-based invariant tests for deferred state tracking.
//!
//! For any script of body pushes, pops and registrations on the main
//! thread:
//!
//! 1. Each tracker is activated at most once.
//! 2. A tracker registered with no open body activates immediately.
//! 3. A tracker registered inside a body activates exactly when that body
//!    pops, in registration order.
//! 4. Closing every body leaves nothing pending.
//!
//! Observed values read back what was last written, whether or not
//! tracking had started when the writes happened.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tidings_model::{Observed, StateTracker, StateTracking, observe_reads};

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Step {
    Push,
    Pop,
    Register,
}

fn script() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        prop_oneof![
            2 => Just(Step::Push),
            2 => Just(Step::Pop),
            3 => Just(Step::Register),
        ],
        0..96,
    )
}

fn writes() -> impl Strategy<Value = Vec<(bool, i64)>> {
    proptest::collection::vec((any::<bool>(), -500i64..500), 1..32)
}

// ── Recorder ─────────────────────────────────────────────────────────────────

struct Recorder {
    id: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl StateTracker for Recorder {
    fn track_state(&self) {
        self.log.lock().unwrap().push(self.id);
    }
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn activation_follows_body_model(steps in script()) {
        let tracking = StateTracking::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut keep = Vec::new();
        let mut model_stack: Vec<Vec<usize>> = Vec::new();
        let mut expected = Vec::new();
        let mut next = 0usize;

        for step in steps {
            match step {
                Step::Push => {
                    tracking.push_body();
                    model_stack.push(Vec::new());
                }
                Step::Pop => {
                    tracking.pop_body();
                    if let Some(pending) = model_stack.pop() {
                        expected.extend(pending);
                    }
                }
                Step::Register => {
                    let recorder = Arc::new(Recorder { id: next, log: Arc::clone(&log) });
                    tracking.register(&recorder);
                    keep.push(recorder);
                    match model_stack.last_mut() {
                        Some(pending) => pending.push(next),
                        None => expected.push(next),
                    }
                    next += 1;
                }
            }
            prop_assert_eq!(&*log.lock().unwrap(), &expected);
            prop_assert_eq!(tracking.depth(), model_stack.len());
        }

        while tracking.depth() > 0 {
            tracking.pop_body();
            if let Some(pending) = model_stack.pop() {
                expected.extend(pending);
            }
        }
        prop_assert_eq!(tracking.pending_count(), 0);

        let seen = log.lock().unwrap().clone();
        prop_assert_eq!(seen.len(), next);
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        prop_assert_eq!(sorted.len(), next);
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn dropped_trackers_are_skipped(keep_mask in proptest::collection::vec(any::<bool>(), 0..24)) {
        let tracking = StateTracking::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = tracking.enter_body();
        let mut kept = Vec::new();
        for (id, keep) in keep_mask.iter().enumerate() {
            let recorder = Arc::new(Recorder { id, log: Arc::clone(&log) });
            tracking.register(&recorder);
            if *keep {
                kept.push(recorder);
            }
        }
        drop(scope);

        let expected: Vec<usize> = keep_mask
            .iter()
            .enumerate()
            .filter_map(|(id, keep)| keep.then_some(id))
            .collect();
        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    }

    #[test]
    fn observed_reads_back_last_write(ops in writes(), activate_at in 0usize..32) {
        let tracking = StateTracking::new();
        tracking.push_body();
        let value = Observed::new_in(0i64, &tracking);
        let mut model = 0i64;

        for (i, (is_add, n)) in ops.into_iter().enumerate() {
            if i == activate_at {
                tracking.pop_body();
            }
            if is_add {
                value.update(|v| v + n);
                model += n;
            } else {
                value.set(n);
                model = n;
            }
            prop_assert_eq!(value.get(), model);
        }

        if tracking.depth() > 0 {
            tracking.pop_body();
        }
        prop_assert!(value.is_tracking());
        let (current, reads) = observe_reads(|| value.get());
        prop_assert_eq!(current, model);
        prop_assert_eq!(reads.len(), 1);
    }
}
