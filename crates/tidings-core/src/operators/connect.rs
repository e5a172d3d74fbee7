//! Reference-counted connections for shared producers.
//!
//! A connectable publisher only produces values while at least one
//! connection is held. [`RefCount`] is the bookkeeping shared by every
//! connectable in the crate ([`MakeConnectable`], [`Autoconnect`] and the
//! periodic timer):
//!
//! 1. The first `connect` starts the producer.
//! 2. Further connects only bump the count.
//! 3. Releasing the last connection stops the producer.
//!
//! The producer is started and stopped outside the lock, so a producer that
//! emits synchronously on start may subscribe or connect re-entrantly.

use std::fmt;
use std::sync::{Arc, Mutex};

use crate::cancellable::AnyCancellable;
use crate::fanout::Fanout;
use crate::publisher::{ConnectablePublisher, Publisher, Receiver};
use crate::sync::lock;

#[derive(Default)]
struct RefState {
    count: usize,
    producer: Option<AnyCancellable>,
}

/// Connection count plus the running producer's token.
pub(crate) struct RefCount {
    label: &'static str,
    state: Mutex<RefState>,
}

impl RefCount {
    pub(crate) fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            state: Mutex::new(RefState::default()),
        })
    }

    /// Take one connection, running `start` if this is the first.
    pub(crate) fn connect(
        self: &Arc<Self>,
        start: impl FnOnce() -> AnyCancellable,
    ) -> AnyCancellable {
        let first = {
            let mut state = lock(&self.state);
            state.count += 1;
            state.count == 1
        };

        if first {
            tracing::debug!(message = "connectable.connect", kind = self.label);
            let producer = start();
            let mut state = lock(&self.state);
            if state.count > 0 && state.producer.is_none() {
                state.producer = Some(producer);
            } else {
                // Every connection was released (or another start won) while
                // this producer was starting.
                drop(state);
                producer.cancel();
            }
        }

        let this = Arc::clone(self);
        AnyCancellable::from_fn(move || this.release())
    }

    fn release(&self) {
        let producer = {
            let mut state = lock(&self.state);
            state.count = state.count.saturating_sub(1);
            if state.count == 0 {
                state.producer.take()
            } else {
                None
            }
        };
        if let Some(producer) = producer {
            tracing::debug!(message = "connectable.disconnect", kind = self.label);
            producer.cancel();
        }
    }

    /// Connections currently held.
    pub(crate) fn count(&self) -> usize {
        lock(&self.state).count
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCount")
            .field("kind", &self.label)
            .field("count", &self.count())
            .finish()
    }
}

/// Shares a single upstream subscription among any number of subscribers.
///
/// Subscribing does not touch the upstream; [`connect`] does. While
/// connected, upstream values are fanned out to every current subscriber.
/// Clones share subscribers and connection state.
///
/// [`connect`]: ConnectablePublisher::connect
pub struct MakeConnectable<P: Publisher> {
    upstream: Arc<P>,
    fanout: Fanout<P::Output>,
    refcount: Arc<RefCount>,
}

impl<P: Publisher> MakeConnectable<P> {
    pub(crate) fn new(upstream: P) -> Self {
        Self {
            upstream: Arc::new(upstream),
            fanout: Fanout::new(),
            refcount: RefCount::new("make_connectable"),
        }
    }

    /// Whether at least one connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.refcount.count() > 0
    }
}

impl<P: Publisher> Clone for MakeConnectable<P> {
    fn clone(&self) -> Self {
        Self {
            upstream: Arc::clone(&self.upstream),
            fanout: self.fanout.clone(),
            refcount: Arc::clone(&self.refcount),
        }
    }
}

impl<P: Publisher> fmt::Debug for MakeConnectable<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MakeConnectable")
            .field("fanout", &self.fanout)
            .field("refcount", &self.refcount)
            .finish()
    }
}

impl<P> Publisher for MakeConnectable<P>
where
    P: Publisher,
    P::Output: Clone,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<P::Output>) -> AnyCancellable {
        self.fanout.subscribe(receive)
    }
}

impl<P> ConnectablePublisher for MakeConnectable<P>
where
    P: Publisher,
    P::Output: Clone,
{
    fn connect(&self) -> AnyCancellable {
        let upstream = Arc::clone(&self.upstream);
        let fanout = self.fanout.clone();
        self.refcount.connect(move || {
            upstream.subscribe(Arc::new(move |value: P::Output| fanout.send(value)))
        })
    }
}

/// Connects its upstream while it has at least one subscriber.
///
/// Each subscription is registered downstream first and only then takes a
/// connection, so values emitted synchronously on connect reach it.
pub struct Autoconnect<C> {
    upstream: C,
    refcount: Arc<RefCount>,
}

impl<C> Autoconnect<C> {
    pub(crate) fn new(upstream: C) -> Self {
        Self {
            upstream,
            refcount: RefCount::new("autoconnect"),
        }
    }
}

impl<C: Clone> Clone for Autoconnect<C> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            refcount: Arc::clone(&self.refcount),
        }
    }
}

impl<C> fmt::Debug for Autoconnect<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Autoconnect")
            .field("refcount", &self.refcount)
            .finish_non_exhaustive()
    }
}

impl<C: ConnectablePublisher> Publisher for Autoconnect<C> {
    type Output = C::Output;
    type Failure = C::Failure;

    fn subscribe(&self, receive: Receiver<C::Output>) -> AnyCancellable {
        let subscription = self.upstream.subscribe(receive);
        let connection = self.refcount.connect(|| self.upstream.connect());
        AnyCancellable::from_fn(move || {
            subscription.cancel();
            connection.cancel();
        })
    }
}
