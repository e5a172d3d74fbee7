//! Redispatch delivery onto a scheduler's context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};
use crate::scheduler::Scheduler;

/// Delivers every value on `scheduler`'s execution context.
///
/// Values arriving on that context already are delivered inline; all others
/// are handed to [`Scheduler::schedule`], which preserves their order.
/// Values already handed off when the subscription is cancelled are dropped
/// when they come up.
pub struct ReceiveOn<P, S> {
    upstream: P,
    scheduler: S,
}

impl<P, S> ReceiveOn<P, S> {
    pub(crate) fn new(upstream: P, scheduler: S) -> Self {
        Self {
            upstream,
            scheduler,
        }
    }
}

impl<P, S> Publisher for ReceiveOn<P, S>
where
    P: Publisher,
    P::Output: Send,
    S: Scheduler + Clone + 'static,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<P::Output>) -> AnyCancellable {
        let live = Arc::new(AtomicBool::new(true));
        let scheduler = self.scheduler.clone();
        let flag = Arc::clone(&live);

        let upstream = self.upstream.subscribe(Arc::new(move |value: P::Output| {
            if !flag.load(Ordering::Acquire) {
                return;
            }
            if scheduler.is_current() {
                receive(value);
                return;
            }
            let flag = Arc::clone(&flag);
            let receive = Arc::clone(&receive);
            tracing::trace!(message = "receive_on.dispatch");
            scheduler.schedule(Box::new(move || {
                if flag.load(Ordering::Acquire) {
                    receive(value);
                }
            }));
        }));

        AnyCancellable::from_fn(move || {
            live.store(false, Ordering::Release);
            upstream.cancel();
        })
    }
}
