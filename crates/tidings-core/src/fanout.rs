#![forbid(unsafe_code)]

//! The fan-out engine behind every subject.
//!
//! [`Fanout<T>`] keeps an insertion-ordered list of subscriber sinks. The
//! list holds each sink through a `Weak`; the only strong reference lives in
//! the [`AnyCancellable`] handed back to the subscriber, so being subscribed
//! never keeps a subscriber alive.
//!
//! # Delivery
//!
//! [`send`](Fanout::send) snapshots the live sinks under the engine lock,
//! prunes expired and cancelled entries while it is there, releases the lock,
//! and only then invokes callbacks. A callback may therefore subscribe,
//! cancel, or send again without deadlocking or corrupting the list.
//!
//! # Invariants
//!
//! 1. Delivery order within one `send` equals subscription order.
//! 2. A sink subscribed during a `send` first receives the *next* value.
//! 3. A sink cancelled during a `send` receives nothing further, including
//!    the remainder of that same pass.
//! 4. The lock is never held while a callback runs.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::cancellable::{AnyCancellable, Cancellable};
use crate::publisher::Receiver;
use crate::sync::lock;

struct Shared<T> {
    sinks: Mutex<Vec<Weak<Sink<T>>>>,
}

struct Sink<T> {
    receive: Receiver<T>,
    live: AtomicBool,
    owner: Weak<Shared<T>>,
}

impl<T> Sink<T> {
    #[inline]
    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}

impl<T: 'static> Cancellable for Sink<T> {
    fn cancel(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(shared) = self.owner.upgrade() {
            let mut sinks = lock(&shared.sinks);
            sinks.retain(|w| w.strong_count() > 0 && !ptr::eq(w.as_ptr(), self));
        }
    }
}

/// Ordered, weakly-held subscriber list for one publishing source.
///
/// Cloning a `Fanout` creates a new handle to the **same** list.
pub struct Fanout<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Fanout<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Fanout<T> {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                sinks: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl<T> fmt::Debug for Fanout<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fanout")
            .field("entries", &lock(&self.shared.sinks).len())
            .finish()
    }
}

impl<T: 'static> Fanout<T> {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `receive` to the tail of the subscriber list.
    ///
    /// The returned token is the sink's only owner: cancelling or dropping it
    /// ends delivery.
    pub fn subscribe(&self, receive: Receiver<T>) -> AnyCancellable {
        let sink = Arc::new(Sink {
            receive,
            live: AtomicBool::new(true),
            owner: Arc::downgrade(&self.shared),
        });
        lock(&self.shared.sinks).push(Arc::downgrade(&sink));
        AnyCancellable::new(sink)
    }

    /// Number of subscribers that would receive the next value.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.sinks)
            .iter()
            .filter(|w| w.upgrade().is_some_and(|s| s.is_live()))
            .count()
    }

    fn snapshot(&self) -> Vec<Arc<Sink<T>>> {
        let mut sinks = lock(&self.shared.sinks);
        let before = sinks.len();
        let mut live = Vec::with_capacity(before);
        sinks.retain(|w| match w.upgrade() {
            Some(sink) if sink.is_live() => {
                live.push(sink);
                true
            }
            _ => false,
        });
        let pruned = before - sinks.len();
        if pruned > 0 {
            tracing::trace!(message = "fanout.prune", pruned, live = live.len());
        }
        live
    }
}

impl<T: Clone + 'static> Fanout<T> {
    /// Deliver `value` to every live subscriber, in subscription order.
    pub fn send(&self, value: T) {
        for sink in self.snapshot() {
            // Re-check: an earlier callback in this pass may have cancelled it.
            if sink.is_live() {
                (sink.receive)(value.clone());
            }
        }
    }
}
