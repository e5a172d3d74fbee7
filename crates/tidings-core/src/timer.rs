#![forbid(unsafe_code)]

//! Periodic timestamps as a connectable publisher.
//!
//! [`Timer::publish`] returns a [`TimerPublisher`] that emits the current
//! time every `every` while connected. The clock itself is abstracted behind
//! [`TickSource`]; the default source, [`SchedulerTicks`], re-arms itself on
//! a [`Scheduler`] after every tick.
//!
//! # Lifecycle
//!
//! Ticking starts on the first [`connect`](ConnectablePublisher::connect)
//! and stops when the last connection is released. Subscribing alone never
//! starts the clock; use [`autoconnect`](ConnectablePublisher::autoconnect)
//! for that.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use web_time::{Duration, Instant};

use crate::cancellable::AnyCancellable;
use crate::fanout::Fanout;
use crate::operators::connect::RefCount;
use crate::publisher::{ConnectablePublisher, Never, Publisher, Receiver};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::sync::lock;

/// Callback invoked on every tick with the tick's timestamp.
pub type Tick = Arc<dyn Fn(Instant) + Send + Sync>;

/// A clock that can be started and stopped.
pub trait TickSource: Send + Sync {
    /// Begin calling `tick` periodically. Replaces any previous callback.
    fn start(&self, tick: Tick);

    /// Stop calling the current callback. No-op when stopped.
    fn stop(&self);
}

struct Run {
    active: AtomicBool,
    pending: Mutex<Option<TaskHandle>>,
}

impl Run {
    fn halt(&self) {
        self.active.store(false, Ordering::Release);
        if let Some(handle) = lock(&self.pending).take() {
            handle.cancel();
        }
    }
}

/// Tick source that schedules itself on a [`Scheduler`].
///
/// The scheduler must honour delays; an [`ImmediateScheduler`] would tick
/// forever without returning.
///
/// [`ImmediateScheduler`]: crate::scheduler::ImmediateScheduler
pub struct SchedulerTicks<S> {
    scheduler: S,
    every: Duration,
    run: Mutex<Option<Arc<Run>>>,
}

impl<S: Scheduler + Clone + 'static> SchedulerTicks<S> {
    /// Tick every `every` on `scheduler`.
    #[must_use]
    pub fn new(every: Duration, scheduler: S) -> Self {
        Self {
            scheduler,
            every,
            run: Mutex::new(None),
        }
    }

    /// The configured interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.every
    }
}

fn arm<S: Scheduler + Clone + 'static>(scheduler: &S, every: Duration, run: Arc<Run>, tick: Tick) {
    let next = scheduler.clone();
    let this_run = Arc::clone(&run);
    let handle = scheduler.schedule_after(
        every,
        Box::new(move || {
            if !this_run.active.load(Ordering::Acquire) {
                return;
            }
            tick(next.now());
            if this_run.active.load(Ordering::Acquire) {
                arm(&next, every, this_run, tick);
            }
        }),
    );
    *lock(&run.pending) = Some(handle);
}

impl<S: Scheduler + Clone + 'static> TickSource for SchedulerTicks<S> {
    fn start(&self, tick: Tick) {
        let run = Arc::new(Run {
            active: AtomicBool::new(true),
            pending: Mutex::new(None),
        });
        if let Some(previous) = lock(&self.run).replace(Arc::clone(&run)) {
            previous.halt();
        }
        tracing::trace!(message = "timer.start", every = ?self.every);
        arm(&self.scheduler, self.every, run, tick);
    }

    fn stop(&self) {
        if let Some(run) = lock(&self.run).take() {
            tracing::trace!(message = "timer.stop");
            run.halt();
        }
    }
}

impl<S> fmt::Debug for SchedulerTicks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerTicks")
            .field("every", &self.every)
            .field("running", &lock(&self.run).is_some())
            .finish()
    }
}

/// Entry point for periodic publishers.
#[derive(Debug, Clone, Copy)]
pub struct Timer;

impl Timer {
    /// A connectable publisher of timestamps, one every `every`, driven by
    /// `scheduler`.
    #[must_use]
    pub fn publish<S>(every: Duration, scheduler: S) -> TimerPublisher
    where
        S: Scheduler + Clone + 'static,
    {
        TimerPublisher::with_source(Arc::new(SchedulerTicks::new(every, scheduler)))
    }
}

/// Connectable periodic publisher returned by [`Timer::publish`].
///
/// Clones share subscribers, clock and connection count.
#[derive(Clone)]
pub struct TimerPublisher {
    fanout: Fanout<Instant>,
    source: Arc<dyn TickSource>,
    refcount: Arc<RefCount>,
}

impl TimerPublisher {
    /// Drive the publisher from an arbitrary tick source.
    #[must_use]
    pub fn with_source(source: Arc<dyn TickSource>) -> Self {
        Self {
            fanout: Fanout::new(),
            source,
            refcount: RefCount::new("timer"),
        }
    }

    /// Whether the clock is currently running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.refcount.count() > 0
    }
}

impl fmt::Debug for TimerPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerPublisher")
            .field("fanout", &self.fanout)
            .field("refcount", &self.refcount)
            .finish()
    }
}

impl Publisher for TimerPublisher {
    type Output = Instant;
    type Failure = Never;

    fn subscribe(&self, receive: Receiver<Instant>) -> AnyCancellable {
        self.fanout.subscribe(receive)
    }
}

impl ConnectablePublisher for TimerPublisher {
    fn connect(&self) -> AnyCancellable {
        self.refcount.connect(|| {
            let fanout = self.fanout.clone();
            self.source.start(Arc::new(move |at| fanout.send(at)));
            let source = Arc::clone(&self.source);
            AnyCancellable::from_fn(move || source.stop())
        })
    }
}
