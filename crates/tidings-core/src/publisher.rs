//! Publisher capability traits and the combinator surface.
//!
//! A [`Publisher`] is anything that hands out subscriptions; a [`Subject`]
//! additionally accepts values from the outside. Every operator in
//! [`crate::operators`] is itself a `Publisher` that owns its upstream(s), so
//! chains compose by value:
//!
//! ```
//! use tidings_core::prelude::*;
//!
//! let subject = PassthroughSubject::<i32>::new();
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
//! let out = seen.clone();
//! let _token = subject
//!     .clone()
//!     .filter(|v| v % 2 == 0)
//!     .map(|v| v * 10)
//!     .sink(move |v| out.lock().unwrap().push(v));
//!
//! for v in 1..=4 {
//!     subject.send(v);
//! }
//! assert_eq!(*seen.lock().unwrap(), vec![20, 40]);
//! ```

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use web_time::Duration;

use crate::cancellable::AnyCancellable;
use crate::operators::{
    CombineLatest, CombineLatest3, CombineLatest4, Debounce, DropFirst, Filter, MakeConnectable,
    Map, ReceiveOn,
};
use crate::operators::connect::Autoconnect;
use crate::scheduler::Scheduler;

/// Shared subscriber callback.
pub type Receiver<T> = Arc<dyn Fn(T) + Send + Sync>;

/// The failure type of every concrete source in this crate.
pub type Never = Infallible;

/// A source of values over time.
///
/// `Failure` names the error a source could terminate with. Every source in
/// this workspace uses [`Never`]; the parameter exists so that joining
/// operators can insist their inputs agree.
pub trait Publisher: Send + Sync {
    /// Values delivered to subscribers.
    type Output: 'static;
    /// Terminal error type.
    type Failure;

    /// Start delivering values to `receive` until the returned token is
    /// cancelled or dropped.
    fn subscribe(&self, receive: Receiver<Self::Output>) -> AnyCancellable;
}

/// A publisher that also accepts values from the outside.
pub trait Subject: Publisher {
    /// Deliver `value` to current subscribers.
    fn send(&self, value: Self::Output);
}

/// A publisher that only produces values while connected.
///
/// Connections are reference counted: the producer starts on the first
/// `connect` and stops when the last returned token is cancelled.
pub trait ConnectablePublisher: Publisher {
    /// Take one connection on the shared producer.
    fn connect(&self) -> AnyCancellable;

    /// Connect on first subscription and disconnect when the last
    /// subscription ends.
    fn autoconnect(self) -> Autoconnect<Self>
    where
        Self: Sized,
    {
        Autoconnect::new(self)
    }
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<Self::Output>) -> AnyCancellable {
        (**self).subscribe(receive)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<Self::Output>) -> AnyCancellable {
        (**self).subscribe(receive)
    }
}

/// Combinators available on every publisher.
pub trait PublisherExt: Publisher + Sized {
    /// Subscribe with a plain closure.
    fn sink(&self, receive: impl Fn(Self::Output) + Send + Sync + 'static) -> AnyCancellable {
        self.subscribe(Arc::new(receive))
    }

    /// Write every value into `root` through `setter`.
    fn assign<R>(
        &self,
        root: R,
        setter: impl Fn(&R, Self::Output) + Send + Sync + 'static,
    ) -> AnyCancellable
    where
        R: Send + Sync + 'static,
    {
        self.sink(move |value| setter(&root, value))
    }

    /// Transform every value.
    fn map<U, F>(self, transform: F) -> Map<Self, F>
    where
        F: Fn(Self::Output) -> U + Send + Sync + 'static,
        U: 'static,
    {
        Map::new(self, transform)
    }

    /// Forward only values for which `predicate` holds.
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
    {
        Filter::new(self, predicate)
    }

    /// Skip the first `count` values of each subscription.
    fn drop_first(self, count: usize) -> DropFirst<Self> {
        DropFirst::new(self, count)
    }

    /// Forward a value only after `interval` passes without a newer one.
    fn debounce<S>(self, interval: Duration, scheduler: S) -> Debounce<Self, S>
    where
        S: Scheduler + Clone + 'static,
    {
        Debounce::new(self, interval, scheduler)
    }

    /// Deliver values on `scheduler`'s context.
    fn receive_on<S>(self, scheduler: S) -> ReceiveOn<Self, S>
    where
        S: Scheduler + Clone + 'static,
    {
        ReceiveOn::new(self, scheduler)
    }

    /// Pair the latest values of `self` and `other`.
    fn combine_latest<P1>(self, other: P1) -> CombineLatest<Self, P1>
    where
        P1: Publisher<Failure = Self::Failure>,
    {
        CombineLatest::new((self, other))
    }

    /// Join the latest values of `self` and two more publishers.
    fn combine_latest3<P1, P2>(self, p1: P1, p2: P2) -> CombineLatest3<Self, P1, P2>
    where
        P1: Publisher<Failure = Self::Failure>,
        P2: Publisher<Failure = Self::Failure>,
    {
        CombineLatest3::new((self, p1, p2))
    }

    /// Join the latest values of `self` and three more publishers.
    fn combine_latest4<P1, P2, P3>(
        self,
        p1: P1,
        p2: P2,
        p3: P3,
    ) -> CombineLatest4<Self, P1, P2, P3>
    where
        P1: Publisher<Failure = Self::Failure>,
        P2: Publisher<Failure = Self::Failure>,
        P3: Publisher<Failure = Self::Failure>,
    {
        CombineLatest4::new((self, p1, p2, p3))
    }

    /// Share one upstream subscription between many subscribers, started
    /// and stopped through [`ConnectablePublisher::connect`].
    fn make_connectable(self) -> MakeConnectable<Self>
    where
        Self::Output: Clone,
    {
        MakeConnectable::new(self)
    }

    /// Hide the concrete operator chain behind [`AnyPublisher`].
    fn erase(self) -> AnyPublisher<Self::Output, Self::Failure>
    where
        Self: 'static,
    {
        AnyPublisher::new(self)
    }
}

impl<P: Publisher> PublisherExt for P {}

/// Type-erased publisher.
pub struct AnyPublisher<T, E = Never> {
    inner: Arc<dyn Publisher<Output = T, Failure = E>>,
}

impl<T: 'static, E: 'static> AnyPublisher<T, E> {
    /// Erase `publisher`.
    pub fn new(publisher: impl Publisher<Output = T, Failure = E> + 'static) -> Self {
        Self {
            inner: Arc::new(publisher),
        }
    }
}

impl<T, E> Clone for AnyPublisher<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> fmt::Debug for AnyPublisher<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyPublisher").finish_non_exhaustive()
    }
}

impl<T: 'static, E> Publisher for AnyPublisher<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe(&self, receive: Receiver<T>) -> AnyCancellable {
        self.inner.subscribe(receive)
    }
}
