//! Observed values with deferred tracking.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use crate::state::StateCell;
use crate::sync::lock;
use crate::tracking::{StateTracker, StateTracking};

/// Raw storage plus the trackable cell created on activation.
///
/// Before activation reads and writes hit the raw value only. Afterwards
/// they are mirrored through the cell, so the host sees them.
pub(crate) struct Tracked<T> {
    raw: Mutex<T>,
    cell: OnceLock<StateCell<T>>,
}

impl<T: Clone + Send> Tracked<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            raw: Mutex::new(value),
            cell: OnceLock::new(),
        }
    }

    pub(crate) fn get(&self) -> T {
        match self.cell.get() {
            Some(cell) => cell.get(),
            None => lock(&self.raw).clone(),
        }
    }

    pub(crate) fn set(&self, value: T) {
        // Activation seeds the cell under `raw`; decide under the same lock.
        let cell = {
            let mut raw = lock(&self.raw);
            *raw = value.clone();
            self.cell.get()
        };
        if let Some(cell) = cell {
            cell.set(value);
        }
    }

    pub(crate) fn activate(&self) {
        let raw = lock(&self.raw);
        self.cell.get_or_init(|| StateCell::new(raw.clone()));
    }

    pub(crate) fn cell(&self) -> Option<&StateCell<T>> {
        self.cell.get()
    }
}

impl<T: Clone + Send + Sync> StateTracker for Tracked<T> {
    fn track_state(&self) {
        self.activate();
    }
}

/// A value that becomes visible to the host once tracking is activated.
///
/// Registers with a [`StateTracking`] service on construction. Clones share
/// the same storage.
///
/// ```
/// use tidings_model::{Observed, StateTracking};
///
/// let tracking = StateTracking::new();
/// let count = {
///     let _body = tracking.enter_body();
///     let count = Observed::new_in(0, &tracking);
///     count.set(count.get() + 1);
///     assert!(!count.is_tracking());
///     count
/// };
/// assert!(count.is_tracking());
/// assert_eq!(count.get(), 1);
/// ```
pub struct Observed<T> {
    inner: Arc<Tracked<T>>,
}

impl<T: Clone + Send + Sync + 'static> Observed<T> {
    /// Create a value registered with [`StateTracking::global`].
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::new_in(value, StateTracking::global())
    }

    /// Create a value registered with `tracking`.
    #[must_use]
    pub fn new_in(value: T, tracking: &StateTracking) -> Self {
        let inner = Arc::new(Tracked::new(value));
        tracking.register(&inner);
        Self { inner }
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.get()
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        self.inner.set(value);
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(T) -> T) {
        self.set(f(self.get()));
    }

    /// Whether tracking has been activated.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.inner.cell().is_some()
    }

    /// The backing cell, once tracking is active.
    #[must_use]
    pub fn cell(&self) -> Option<&StateCell<T>> {
        self.inner.cell()
    }
}

impl<T> Clone for Observed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + fmt::Debug> fmt::Debug for Observed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observed")
            .field("value", &self.inner.get())
            .field("tracking", &self.inner.cell().is_some())
            .finish()
    }
}
