//! Quiet-period filtering.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use web_time::Duration;

use crate::cancellable::AnyCancellable;
use crate::publisher::{Publisher, Receiver};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::sync::lock;

/// Forwards a value only once `interval` has passed without a newer one.
///
/// Every upstream value cancels the delivery scheduled for its predecessor
/// and schedules its own. Cancelling the subscription also cancels a
/// delivery that is still waiting on the scheduler.
pub struct Debounce<P, S> {
    upstream: P,
    interval: Duration,
    scheduler: S,
}

impl<P, S> Debounce<P, S> {
    pub(crate) fn new(upstream: P, interval: Duration, scheduler: S) -> Self {
        Self {
            upstream,
            interval,
            scheduler,
        }
    }
}

impl<P, S> Publisher for Debounce<P, S>
where
    P: Publisher,
    P::Output: Send,
    S: Scheduler + Clone + 'static,
{
    type Output = P::Output;
    type Failure = P::Failure;

    fn subscribe(&self, receive: Receiver<P::Output>) -> AnyCancellable {
        let live = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(AtomicU64::new(0));
        let pending: Arc<Mutex<Option<(u64, TaskHandle)>>> = Arc::new(Mutex::new(None));

        let upstream = {
            let live = Arc::clone(&live);
            let pending = Arc::clone(&pending);
            let scheduler = self.scheduler.clone();
            let interval = self.interval;
            self.upstream.subscribe(Arc::new(move |value: P::Output| {
                if !live.load(Ordering::Acquire) {
                    return;
                }
                let ticket = latest.fetch_add(1, Ordering::AcqRel) + 1;
                let deliver_live = Arc::clone(&live);
                let deliver_latest = Arc::clone(&latest);
                let receive = Arc::clone(&receive);
                let handle = scheduler.schedule_after(
                    interval,
                    Box::new(move || {
                        if deliver_live.load(Ordering::Acquire)
                            && deliver_latest.load(Ordering::Acquire) == ticket
                        {
                            receive(value);
                        }
                    }),
                );
                // Concurrent senders may get here out of order; only the
                // newest ticket may occupy the slot.
                let stale = {
                    let mut slot = lock(&pending);
                    match slot.as_ref() {
                        Some((current, _)) if *current > ticket => Some(handle),
                        _ => slot.replace((ticket, handle)).map(|(_, h)| h),
                    }
                };
                if let Some(stale) = stale {
                    stale.cancel();
                }
            }))
        };

        AnyCancellable::from_fn(move || {
            live.store(false, Ordering::Release);
            if let Some((_, handle)) = lock(&pending).take() {
                handle.cancel();
            }
            upstream.cancel();
        })
    }
}
