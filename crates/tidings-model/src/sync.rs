use std::sync::{Mutex, MutexGuard, PoisonError};

/// Acquire `mutex`, recovering from poisoning.
///
/// Values guarded in this crate are replaced wholesale, never left half
/// written, so the guard is still usable after a panic elsewhere.
#[inline]
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
