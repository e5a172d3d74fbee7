//! Deadline-ordered task queue shared by the lab and run-loop schedulers.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use web_time::Instant;

use super::{TaskHandle, Work};

struct Queued {
    deadline: Instant,
    seq: u64,
    handle: TaskHandle,
    work: Work,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of work keyed by `(deadline, submission order)`.
#[derive(Default)]
pub(super) struct TaskQueue {
    heap: BinaryHeap<Reverse<Queued>>,
    next_seq: u64,
}

impl TaskQueue {
    pub(super) fn push(&mut self, deadline: Instant, handle: TaskHandle, work: Work) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Queued {
            deadline,
            seq,
            handle,
            work,
        }));
    }

    /// Earliest deadline among work that has not been cancelled.
    pub(super) fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(q)| q.deadline)
    }

    /// Remove and return the earliest live work due at or before `now`.
    pub(super) fn pop_due(&mut self, now: Instant) -> Option<(Instant, Work)> {
        self.discard_cancelled();
        match self.heap.peek() {
            Some(Reverse(q)) if q.deadline <= now => {}
            _ => return None,
        }
        self.heap.pop().map(|Reverse(q)| (q.deadline, q.work))
    }

    /// Number of queued items that have not been cancelled.
    pub(super) fn live_len(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(q)| !q.handle.is_cancelled())
            .count()
    }

    fn discard_cancelled(&mut self) {
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(q)| q.handle.is_cancelled())
        {
            self.heap.pop();
        }
    }
}
