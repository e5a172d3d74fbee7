#![forbid(unsafe_code)]

//! Subscription tokens.
//!
//! Every subscribe call returns an [`AnyCancellable`]. The token wraps at most
//! one cancel action and fires it exactly once: on the first call to
//! [`cancel()`](AnyCancellable::cancel), or when the last handle to the token
//! is dropped, whichever comes first.
//!
//! # Invariants
//!
//! 1. The wrapped action runs at most once per token.
//! 2. Cloning a token yields a handle to the **same** token; cancelling any
//!    handle cancels all of them.
//! 3. Equality and hashing follow the identity of the wrapped action, so two
//!    tokens built from the same shared [`Cancellable`] are equal.
//! 4. Cancellation never blocks on subscriber callbacks and never panics on
//!    its own.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::sync::lock;

/// Something that can be cancelled.
///
/// Implementations must tolerate repeated calls; [`AnyCancellable`] only
/// guarantees that *it* forwards the first one.
pub trait Cancellable: Send + Sync {
    /// Stop the associated activity.
    fn cancel(&self);
}

/// A set of tokens kept alive together, keyed by token identity.
pub type CancellableSet = ahash::AHashSet<AnyCancellable>;

/// Adapts a one-shot closure into a [`Cancellable`].
struct CancelFn {
    on_cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Cancellable for CancelFn {
    fn cancel(&self) {
        // Take first so the closure runs without the lock held.
        let on_cancel = lock(&self.on_cancel).take();
        if let Some(on_cancel) = on_cancel {
            on_cancel();
        }
    }
}

struct Slot {
    /// Held for the token's whole lifetime so its address stays unique.
    action: Option<Arc<dyn Cancellable>>,
    fired: AtomicBool,
}

impl Slot {
    fn fire(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(action) = &self.action {
            action.cancel();
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.fire();
    }
}

/// Type-erased, idempotent cancel handle.
#[derive(Clone)]
pub struct AnyCancellable {
    slot: Arc<Slot>,
}

impl AnyCancellable {
    /// Wrap a shared cancellable.
    ///
    /// Tokens wrapping the same `Arc` compare equal.
    #[must_use]
    pub fn new(action: Arc<dyn Cancellable>) -> Self {
        Self {
            slot: Arc::new(Slot {
                action: Some(action),
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Wrap a closure that runs on first cancellation.
    #[must_use]
    pub fn from_fn(on_cancel: impl FnOnce() + Send + 'static) -> Self {
        Self::new(Arc::new(CancelFn {
            on_cancel: Mutex::new(Some(Box::new(on_cancel))),
        }))
    }

    /// A token with nothing to cancel.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slot: Arc::new(Slot {
                action: None,
                fired: AtomicBool::new(true),
            }),
        }
    }

    /// Cancel the wrapped action. Later calls do nothing.
    pub fn cancel(&self) {
        self.slot.fire();
    }

    /// Whether the wrapped action has already fired (or there never was one).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.slot.fired.load(Ordering::Acquire)
    }

    /// Keep this token alive in `set` until the set is dropped or cleared.
    pub fn store(self, set: &mut CancellableSet) {
        set.insert(self);
    }

    fn identity(&self) -> usize {
        match &self.slot.action {
            Some(action) => Arc::as_ptr(action) as *const () as usize,
            None => Arc::as_ptr(&self.slot) as *const () as usize,
        }
    }
}

impl Cancellable for AnyCancellable {
    fn cancel(&self) {
        AnyCancellable::cancel(self);
    }
}

impl PartialEq for AnyCancellable {
    fn eq(&self, other: &Self) -> bool {
        match (&self.slot.action, &other.slot.action) {
            (Some(_), Some(_)) => self.identity() == other.identity(),
            (None, None) => Arc::ptr_eq(&self.slot, &other.slot),
            _ => false,
        }
    }
}

impl Eq for AnyCancellable {}

impl Hash for AnyCancellable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for AnyCancellable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCancellable")
            .field("id", &format_args!("{:#x}", self.identity()))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::publisher::Subject;

    struct Counter(AtomicUsize);

    impl Cancellable for Counter {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_token() -> (AnyCancellable, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let token = AnyCancellable::from_fn(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (token, count)
    }

    #[test]
    fn cancel_runs_action_once() {
        let (token, count) = counting_token();
        assert!(!token.is_cancelled());
        token.cancel();
        token.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(token.is_cancelled());
    }

    #[test]
    fn drop_cancels() {
        let (token, count) = counting_token();
        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_after_cancel_does_not_refire() {
        let (token, count) = counting_token();
        token.cancel();
        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_state() {
        let (token, count) = counting_token();
        let other = token.clone();
        other.cancel();
        assert!(token.is_cancelled());
        drop(token);
        drop(other);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clone_keeps_token_alive() {
        let (token, count) = counting_token();
        let other = token.clone();
        drop(token);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(other);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tokens_over_same_action_are_equal() {
        let action: Arc<dyn Cancellable> = Arc::new(Counter(AtomicUsize::new(0)));
        let a = AnyCancellable::new(Arc::clone(&action));
        let b = AnyCancellable::new(Arc::clone(&action));
        assert_eq!(a, b);

        let mut set = CancellableSet::new();
        a.store(&mut set);
        b.store(&mut set);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn distinct_actions_are_not_equal() {
        let (a, _) = counting_token();
        let (b, _) = counting_token();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn empty_tokens_compare_by_identity() {
        let a = AnyCancellable::empty();
        let b = AnyCancellable::empty();
        assert!(a.is_cancelled());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        a.cancel();
    }

    #[test]
    fn cancel_from_inside_action_is_harmless() {
        let holder: Arc<Mutex<Option<AnyCancellable>>> = Arc::new(Mutex::new(None));
        let h = Arc::clone(&holder);
        let token = AnyCancellable::from_fn(move || {
            if let Some(t) = h.lock().unwrap().as_ref() {
                t.cancel();
            }
        });
        *holder.lock().unwrap() = Some(token.clone());
        token.cancel();
        assert!(token.is_cancelled());
        holder.lock().unwrap().take();
    }

    #[test]
    fn store_keeps_token_until_set_dropped() {
        let (token, count) = counting_token();
        let mut set = CancellableSet::new();
        token.store(&mut set);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        set.clear();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn debug_reports_state() {
        let (token, _count) = counting_token();
        let dbg = format!("{token:?}");
        assert!(dbg.contains("AnyCancellable"));
        assert!(dbg.contains("cancelled: false"));
    }

    #[test]
    fn cancelled_token_in_set_does_not_shadow_new_subscriptions() {
        use crate::publisher::PublisherExt;
        use crate::subject::PassthroughSubject;

        let subject = PassthroughSubject::<i32>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let mut bag = CancellableSet::new();

        for _ in 0..100 {
            let old = subject.sink(|_| {});
            old.clone().store(&mut bag);
            old.cancel();
            drop(old);

            let h = Arc::clone(&hits);
            subject
                .sink(move |_| {
                    h.fetch_add(1, Ordering::SeqCst);
                })
                .store(&mut bag);
        }

        assert_eq!(bag.len(), 200);
        assert_eq!(subject.subscriber_count(), 100);
        subject.send(1);
        assert_eq!(hits.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn identity_is_stable_after_cancel() {
        let (token, _count) = counting_token();
        let copy = token.clone();
        let mut set = CancellableSet::new();
        token.clone().store(&mut set);
        token.cancel();
        assert!(set.contains(&copy));
        assert_eq!(format!("{token:?}"), format!("{copy:?}"));
    }
}
