//! Predicate filtering.

use std::sync::Arc;

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};

/// Forwards only values for which the predicate holds.
pub struct Filter<P, F> {
    upstream: P,
    predicate: Arc<F>,
}

impl<P, F> Filter<P, F> {
    pub(crate) fn new(upstream: P, predicate: F) -> Self {
        Self {
            upstream,
            predicate: Arc::new(predicate),
        }
    }
}

impl<P, F> Publisher for Filter<P, F>
where
    P: Publisher,
    F: Fn(&P::Output) -> bool + Send + Sync + 'static,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<P::Output>) -> AnyCancellable {
        let predicate = Arc::clone(&self.predicate);
        self.upstream.subscribe(Arc::new(move |value: P::Output| {
            if predicate(&value) {
                receive(value);
            }
        }))
    }
}
