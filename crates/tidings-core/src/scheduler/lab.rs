//! Virtual-time scheduler for deterministic tests.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use web_time::{Duration, Instant};

use super::queue::TaskQueue;
use super::{Scheduler, TaskHandle, Work};
use crate::sync::lock;

static NEXT_LAB_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the lab scheduler currently draining on this thread (0 = none).
    static DRAINING: Cell<u64> = const { Cell::new(0) };
}

/// Marks this thread as draining `id` and restores the previous mark on
/// drop, including during unwinding.
struct DrainGuard {
    previous: u64,
}

impl DrainGuard {
    fn enter(id: u64) -> Self {
        Self {
            previous: DRAINING.with(|d| d.replace(id)),
        }
    }
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        DRAINING.with(|d| d.set(self.previous));
    }
}

struct LabState {
    offset: Duration,
    queue: TaskQueue,
}

struct LabInner {
    id: u64,
    epoch: Instant,
    state: Mutex<LabState>,
}

/// A scheduler whose clock only moves when told to.
///
/// Work runs on the thread that calls [`advance`](LabScheduler::advance),
/// and only while it does; that thread counts as the scheduler's context
/// for the duration of the call. All clones share the same clock and queue.
///
/// ```
/// use tidings_core::scheduler::{LabScheduler, Scheduler};
/// use web_time::Duration;
///
/// let lab = LabScheduler::new();
/// let t0 = lab.now();
/// lab.advance(Duration::from_millis(250));
/// assert_eq!(lab.now().duration_since(t0), Duration::from_millis(250));
/// ```
#[derive(Clone)]
pub struct LabScheduler {
    inner: Arc<LabInner>,
}

impl LabScheduler {
    /// Create a lab scheduler starting at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(LabInner {
                id: NEXT_LAB_ID.fetch_add(1, Ordering::Relaxed),
                epoch: Instant::now(),
                state: Mutex::new(LabState {
                    offset: Duration::ZERO,
                    queue: TaskQueue::default(),
                }),
            }),
        }
    }

    /// Move the clock forward by `delta`, running every piece of work that
    /// comes due along the way (including work scheduled by that work).
    pub fn advance(&self, delta: Duration) {
        let target = {
            let state = lock(&self.inner.state);
            state.offset + delta
        };
        let _draining = DrainGuard::enter(self.inner.id);

        loop {
            let due = {
                let mut state = lock(&self.inner.state);
                let now = self.inner.epoch + target;
                let next = state.queue.pop_due(now);
                if let Some((deadline, _)) = &next {
                    let at = deadline.duration_since(self.inner.epoch);
                    state.offset = state.offset.max(at);
                }
                next
            };
            match due {
                Some((_, work)) => {
                    tracing::trace!(message = "lab.run", lab_id = self.inner.id);
                    work();
                }
                None => break,
            }
        }

        let mut state = lock(&self.inner.state);
        state.offset = state.offset.max(target);
    }

    /// Run everything that is already due without moving the clock.
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    /// Number of queued pieces of work that have not been cancelled.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.state).queue.live_len()
    }

    /// Time elapsed on the virtual clock since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        lock(&self.inner.state).offset
    }
}

impl Default for LabScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LabScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("LabScheduler")
            .field("id", &self.inner.id)
            .field("elapsed", &state.offset)
            .field("pending", &state.queue.live_len())
            .finish()
    }
}

impl Scheduler for LabScheduler {
    fn now(&self) -> Instant {
        self.inner.epoch + lock(&self.inner.state).offset
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut state = lock(&self.inner.state);
        let deadline = self.inner.epoch + state.offset + delay;
        state.queue.push(deadline, handle.clone(), work);
        handle
    }

    fn is_current(&self) -> bool {
        DRAINING.with(|d| d.get() == self.inner.id)
    }
}
