//! Skip a fixed number of leading values.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};

/// Skips the first `count` values of every subscription.
///
/// Each subscription counts down on its own; a late subscriber still skips
/// its own first `count` values.
pub struct DropFirst<P> {
    upstream: P,
    count: usize,
}

impl<P> DropFirst<P> {
    pub(crate) fn new(upstream: P, count: usize) -> Self {
        Self { upstream, count }
    }
}

impl<P: Publisher> Publisher for DropFirst<P> {
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<P::Output>) -> AnyCancellable {
        let remaining = AtomicUsize::new(self.count);
        self.upstream.subscribe(Arc::new(move |value: P::Output| {
            let skipped = remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if !skipped {
                receive(value);
            }
        }))
    }
}
