//! Subjects: publishers fed from the outside.

use std::fmt;
use std::marker::PhantomData;

use crate::cancellable::AnyCancellable;
use crate::fanout::Fanout;
use crate::publisher::{Never, Publisher, Receiver, Subject};

/// Broadcasts each sent value to the subscribers present at that moment.
///
/// Nothing is buffered: values sent while nobody is subscribed are dropped.
/// Cloning creates another handle to the same subject.
pub struct PassthroughSubject<T, E = Never> {
    fanout: Fanout<T>,
    _failure: PhantomData<fn() -> E>,
}

impl<T: 'static, E> PassthroughSubject<T, E> {
    /// Create a subject with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fanout: Fanout::new(),
            _failure: PhantomData,
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }
}

impl<T: 'static, E> Default for PassthroughSubject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for PassthroughSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            fanout: self.fanout.clone(),
            _failure: PhantomData,
        }
    }
}

impl<T, E> fmt::Debug for PassthroughSubject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassthroughSubject")
            .field("fanout", &self.fanout)
            .finish()
    }
}

impl<T: Clone + 'static, E> Publisher for PassthroughSubject<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe(&self, receive: Receiver<T>) -> AnyCancellable {
        self.fanout.subscribe(receive)
    }
}

impl<T: Clone + 'static, E> Subject for PassthroughSubject<T, E> {
    fn send(&self, value: T) {
        self.fanout.send(value);
    }
}

/// The `()`-valued "about to change" signal of an observable object.
#[derive(Clone, Default)]
pub struct ObservableObjectPublisher {
    fanout: Fanout<()>,
}

impl ObservableObjectPublisher {
    /// Create a publisher with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce an upcoming change.
    pub fn send(&self) {
        self.fanout.send(());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }
}

impl fmt::Debug for ObservableObjectPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableObjectPublisher")
            .field("fanout", &self.fanout)
            .finish()
    }
}

impl Publisher for ObservableObjectPublisher {
    type Output = ();
    type Failure = Never;

    fn subscribe(&self, receive: Receiver<()>) -> AnyCancellable {
        self.fanout.subscribe(receive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::PublisherExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn values_before_subscription_are_dropped() {
        let subject = PassthroughSubject::<i32>::new();
        subject.send(1);
        subject.send(2);
        subject.send(3);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let token = subject.sink(move |v| out.lock().unwrap().push(v));
        subject.send(4);
        token.cancel();
        subject.send(5);

        assert_eq!(*seen.lock().unwrap(), vec![4]);
    }

    #[test]
    fn clones_share_subscribers() {
        let subject = PassthroughSubject::<i32>::new();
        let twin = subject.clone();
        let _token = subject.sink(|_| {});
        assert_eq!(twin.subscriber_count(), 1);
    }

    #[test]
    fn object_will_change_fires_unit() {
        let publisher = ObservableObjectPublisher::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let _token = publisher.sink(move |()| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        publisher.send();
        publisher.send();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(publisher.subscriber_count(), 1);
    }
}
