#![forbid(unsafe_code)]

//! Deferred activation of state tracking.
//!
//! An observable property does not begin real tracking the moment it is
//! created. It registers a [`StateTracker`] with a [`StateTracking`]
//! service, which decides when `track_state()` runs:
//!
//! - on the designated main thread, while a host body is executing, the
//!   tracker waits until that body pops;
//! - everywhere else it runs immediately.
//!
//! This breaks the feedback loop where a parent body creates a child that
//! constructs an observable object which reads and writes its own state in
//! the constructor: tracking those accesses inside the parent's body would
//! invalidate the parent, which would recreate the child, and so on.
//!
//! # Invariants
//!
//! 1. A registered tracker is activated at most once.
//! 2. A tracker deferred into a body is activated exactly when that body
//!    pops, after every tracker registered earlier in the same body.
//! 3. Pending lists are only touched from the main thread. Other threads
//!    bypass them.
//! 4. Pending trackers are held weakly; a tracker dropped before its body
//!    pops is skipped.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::thread::{self, ThreadId};

use crate::sync::lock;

/// Something that starts observing its state when asked.
pub trait StateTracker: Send + Sync {
    /// Begin tracking. Called at most once per registration.
    fn track_state(&self);
}

type Pending = Vec<Weak<dyn StateTracker>>;

/// Decides when registered trackers become active.
///
/// A process-wide instance is available through [`StateTracking::global`];
/// independent instances can be built for isolated hosts and tests.
pub struct StateTracking {
    main_thread: Mutex<ThreadId>,
    bodies: Mutex<Vec<Pending>>,
}

impl StateTracking {
    /// A fresh service whose main thread is the calling thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_main_thread(thread::current().id())
    }

    /// A fresh service with an explicit main thread.
    #[must_use]
    pub fn with_main_thread(main: ThreadId) -> Self {
        Self {
            main_thread: Mutex::new(main),
            bodies: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide service.
    ///
    /// Its main thread is whichever thread touched it first; hosts should
    /// call [`designate_main_thread`](Self::designate_main_thread) from their
    /// UI thread during startup.
    #[must_use]
    pub fn global() -> &'static StateTracking {
        static GLOBAL: OnceLock<StateTracking> = OnceLock::new();
        GLOBAL.get_or_init(StateTracking::new)
    }

    /// Make the calling thread the main thread.
    ///
    /// Bodies opened on the previous main thread are discarded after their
    /// pending trackers are activated.
    pub fn designate_main_thread(&self) {
        let current = thread::current().id();
        let previous = {
            let mut main = lock(&self.main_thread);
            std::mem::replace(&mut *main, current)
        };
        if previous != current {
            let orphaned: Vec<Pending> = std::mem::take(&mut *self.lock_bodies());
            tracing::debug!(
                message = "tracking.designate_main",
                orphaned_bodies = orphaned.len()
            );
            for pending in orphaned.into_iter().rev() {
                activate(pending);
            }
        }
    }

    /// Whether the calling thread is the main thread.
    #[must_use]
    pub fn is_main_thread(&self) -> bool {
        let main = *lock(&self.main_thread);
        thread::current().id() == main
    }

    /// Open a body level. Ignored off the main thread.
    pub fn push_body(&self) {
        if !self.is_main_thread() {
            return;
        }
        let mut bodies = self.lock_bodies();
        bodies.push(Vec::new());
        tracing::trace!(message = "tracking.push", depth = bodies.len());
    }

    /// Close the innermost body level and activate every tracker that was
    /// deferred into it, in registration order.
    ///
    /// Ignored off the main thread. Popping with no open body is tolerated
    /// and logged.
    pub fn pop_body(&self) {
        if !self.is_main_thread() {
            return;
        }
        let pending = {
            let mut bodies = self.lock_bodies();
            match bodies.pop() {
                Some(pending) => pending,
                None => {
                    drop(bodies);
                    tracing::warn!(message = "tracking.pop_without_push");
                    return;
                }
            }
        };
        if !pending.is_empty() {
            tracing::debug!(message = "tracking.flush", trackers = pending.len());
        }
        activate(pending);
    }

    /// Open a body level that closes when the returned guard drops.
    #[must_use = "the body closes as soon as the scope is dropped"]
    pub fn enter_body(&self) -> BodyScope<'_> {
        self.push_body();
        BodyScope { tracking: self }
    }

    /// Register `tracker`, activating it now or when the innermost open body
    /// pops.
    pub fn register<T: StateTracker + 'static>(&self, tracker: &Arc<T>) {
        if self.is_main_thread() {
            let mut bodies = self.lock_bodies();
            if let Some(innermost) = bodies.last_mut() {
                let weak: Weak<T> = Arc::downgrade(tracker);
                innermost.push(weak);
                tracing::debug!(message = "tracking.defer", depth = bodies.len());
                return;
            }
        }
        tracker.track_state();
    }

    /// Number of open body levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lock_bodies().len()
    }

    /// Number of trackers waiting across all open bodies.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock_bodies().iter().map(Vec::len).sum()
    }

    fn lock_bodies(&self) -> MutexGuard<'_, Vec<Pending>> {
        lock(&self.bodies)
    }
}

fn activate(pending: Pending) {
    for tracker in pending {
        if let Some(tracker) = tracker.upgrade() {
            tracker.track_state();
        }
    }
}

impl Default for StateTracking {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateTracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTracking")
            .field("depth", &self.depth())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Guard returned by [`StateTracking::enter_body`].
pub struct BodyScope<'a> {
    tracking: &'a StateTracking,
}

impl fmt::Debug for BodyScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyScope").finish_non_exhaustive()
    }
}

impl Drop for BodyScope<'_> {
    fn drop(&mut self) {
        self.tracking.pop_body();
    }
}
