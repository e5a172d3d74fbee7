#![forbid(unsafe_code)]

//! Scheduler capability.
//!
//! Operators that delay or redispatch delivery ([`Debounce`], [`ReceiveOn`])
//! and the periodic [`Timer`] never block a thread; they hand work to a
//! [`Scheduler`] instead.
//!
//! Three schedulers ship with the crate:
//!
//! - [`ImmediateScheduler`]: runs work inline on the calling thread.
//! - [`LabScheduler`]: virtual time, advanced explicitly; for deterministic
//!   tests.
//! - [`RunLoop`]: a dedicated thread with a timer queue; the natural
//!   designated context for UI-affecting delivery.
//!
//! # Ordering
//!
//! Work with equal deadlines runs in submission order.
//!
//! [`Debounce`]: crate::operators::Debounce
//! [`ReceiveOn`]: crate::operators::ReceiveOn
//! [`Timer`]: crate::timer::Timer

mod lab;
mod queue;
mod run_loop;

pub use lab::LabScheduler;
pub use run_loop::{RunLoop, RunLoopConfig, RunLoopError};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use web_time::{Duration, Instant};

use crate::cancellable::Cancellable;

/// A unit of scheduled work.
pub type Work = Box<dyn FnOnce() + Send>;

/// Handle to one piece of scheduled work.
///
/// Unlike [`AnyCancellable`](crate::AnyCancellable), dropping a handle does
/// not cancel the work; only [`cancel()`](TaskHandle::cancel) does.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a live handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle whose work will never run.
    #[must_use]
    pub fn cancelled() -> Self {
        let handle = Self::new();
        handle.cancel();
        handle
    }

    /// Prevent the work from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether [`cancel()`](TaskHandle::cancel) has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Cancellable for TaskHandle {
    fn cancel(&self) {
        TaskHandle::cancel(self);
    }
}

/// Runs work now or later on some execution context.
pub trait Scheduler: Send + Sync {
    /// Current time according to this scheduler.
    fn now(&self) -> Instant;

    /// Run `work` once `delay` has elapsed.
    fn schedule_after(&self, delay: Duration, work: Work) -> TaskHandle;

    /// Run `work` as soon as possible.
    fn schedule(&self, work: Work) -> TaskHandle {
        self.schedule_after(Duration::ZERO, work)
    }

    /// Whether the calling thread is this scheduler's execution context.
    fn is_current(&self) -> bool;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> TaskHandle {
        (**self).schedule_after(delay, work)
    }

    fn schedule(&self, work: Work) -> TaskHandle {
        (**self).schedule(work)
    }

    fn is_current(&self) -> bool {
        (**self).is_current()
    }
}

/// Runs work synchronously on the calling thread, ignoring delays.
///
/// Every thread counts as this scheduler's context.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule_after(&self, _delay: Duration, work: Work) -> TaskHandle {
        work();
        TaskHandle::new()
    }

    fn is_current(&self) -> bool {
        true
    }
}
