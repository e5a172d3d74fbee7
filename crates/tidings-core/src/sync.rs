//! Lock helpers shared by the engine and operators.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Acquire `mutex`, recovering the guard if a previous holder panicked.
///
/// Every critical section in this crate either completes its update or
/// leaves the protected value untouched, so a poisoned lock still guards a
/// consistent value.
#[inline]
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
