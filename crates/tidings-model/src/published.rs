//! Published properties.
//!
//! A [`Published`] value announces each change *before* storing it. The
//! announcement carries the new value, while reads made from inside a
//! subscriber still see the old one. New subscribers are handed the current
//! value synchronously on subscribe.

use std::fmt;
use std::sync::{Arc, Mutex};

use tidings_core::{
    AnyCancellable, Fanout, Never, ObservableObjectPublisher, Publisher, Receiver, Subject,
};

use crate::observed::Tracked;
use crate::sync::lock;
use crate::tracking::{StateTracker, StateTracking};

/// A subject that replays its most recent value to each new subscriber.
///
/// Clones share subscribers and the remembered value.
pub struct PropertySubject<T> {
    fanout: Fanout<T>,
    current: Arc<Mutex<Option<T>>>,
}

impl<T: Clone + Send + 'static> PropertySubject<T> {
    /// A subject with nothing to replay yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fanout: Fanout::new(),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// A subject that replays `value` until something else is sent.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        let subject = Self::new();
        *lock(&subject.current) = Some(value);
        subject
    }

    /// The value a new subscriber would receive.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        lock(&self.current).clone()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }
}

impl<T: Clone + Send + 'static> Default for PropertySubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for PropertySubject<T> {
    fn clone(&self) -> Self {
        Self {
            fanout: self.fanout.clone(),
            current: Arc::clone(&self.current),
        }
    }
}

impl<T> fmt::Debug for PropertySubject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySubject")
            .field("fanout", &self.fanout)
            .field("has_value", &lock(&self.current).is_some())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Publisher for PropertySubject<T> {
    type Output = T;
    type Failure = Never;

    fn subscribe(&self, receive: Receiver<T>) -> AnyCancellable {
        let token = self.fanout.subscribe(Arc::clone(&receive));
        let current = lock(&self.current).clone();
        if let Some(current) = current {
            receive(current);
        }
        token
    }
}

impl<T: Clone + Send + 'static> Subject for PropertySubject<T> {
    fn send(&self, value: T) {
        *lock(&self.current) = Some(value.clone());
        self.fanout.send(value);
    }
}

struct PublishedInner<T> {
    value: Tracked<T>,
    subject: PropertySubject<T>,
    will_change: Mutex<Option<ObservableObjectPublisher>>,
}

impl<T: Clone + Send + Sync + 'static> StateTracker for PublishedInner<T> {
    fn track_state(&self) {
        self.value.activate();
    }
}

/// A stored value that publishes every change.
///
/// Setting a new value, in order:
///
/// 1. fires the attached owner's will-change publisher, if any;
/// 2. sends the new value to [`publisher()`](Published::publisher)
///    subscribers;
/// 3. stores it.
///
/// Storage is tracked the same way as [`Observed`](crate::Observed).
pub struct Published<T> {
    inner: Arc<PublishedInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Published<T> {
    /// Create a property registered with [`StateTracking::global`].
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::new_in(value, StateTracking::global())
    }

    /// Create a property registered with `tracking`.
    #[must_use]
    pub fn new_in(value: T, tracking: &StateTracking) -> Self {
        let inner = Arc::new(PublishedInner {
            subject: PropertySubject::with_value(value.clone()),
            value: Tracked::new(value),
            will_change: Mutex::new(None),
        });
        tracking.register(&inner);
        Self { inner }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    /// Announce and store `value`.
    pub fn set(&self, value: T) {
        let owner = lock(&self.inner.will_change).clone();
        if let Some(owner) = owner {
            owner.send();
        }
        self.inner.subject.send(value.clone());
        self.inner.value.set(value);
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(T) -> T) {
        self.set(f(self.get()));
    }

    /// The change stream. Subscribing yields the current value first.
    #[must_use]
    pub fn publisher(&self) -> PropertySubject<T> {
        self.inner.subject.clone()
    }

    /// Fire `owner` before every change from now on.
    pub fn attach(&self, owner: &ObservableObjectPublisher) {
        *lock(&self.inner.will_change) = Some(owner.clone());
    }

    /// Whether tracking has been activated.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.inner.value.cell().is_some()
    }
}

impl<T> Clone for Published<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + fmt::Debug> fmt::Debug for Published<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Published")
            .field("value", &self.inner.value.get())
            .field("subject", &self.inner.subject)
            .finish()
    }
}
