//! Value transformation.

use std::sync::Arc;

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};

/// Forwards `transform(value)` for every upstream value.
///
/// A panicking transform unwinds into whoever called `send` upstream.
pub struct Map<P, F> {
    upstream: P,
    transform: Arc<F>,
}

impl<P, F> Map<P, F> {
    pub(crate) fn new(upstream: P, transform: F) -> Self {
        Self {
            upstream,
            transform: Arc::new(transform),
        }
    }
}

impl<P, F, U> Publisher for Map<P, F>
where
    P: Publisher,
    F: Fn(P::Output) -> U + Send + Sync + 'static,
    U: 'static,
{
    type Output = U;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<U>) -> AnyCancellable {
        let transform = Arc::clone(&self.transform);
        self.upstream
            .subscribe(Arc::new(move |value: P::Output| receive(transform(value))))
    }
}
