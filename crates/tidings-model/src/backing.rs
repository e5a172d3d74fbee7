//! Anonymous trackable counters for synthesized observation.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::state::StateCell;
use crate::tracking::{StateTracker, StateTracking};

struct BackingInner {
    count: usize,
    cells: OnceLock<Vec<StateCell<u64>>>,
}

impl StateTracker for BackingInner {
    fn track_state(&self) {
        self.cells
            .get_or_init(|| (0..self.count).map(|_| StateCell::new(0)).collect());
    }
}

/// A fixed number of counters standing in for an object's properties.
///
/// Objects whose observation is generated rather than written by hand keep
/// their values in ordinary fields and call [`access`](Self::access) on
/// every read and [`update`](Self::update) on every write of property
/// `index`. Until tracking is activated both calls are no-ops.
pub struct StateBacking {
    inner: Arc<BackingInner>,
}

impl StateBacking {
    /// `count` counters registered with [`StateTracking::global`].
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self::new_in(count, StateTracking::global())
    }

    /// `count` counters registered with `tracking`.
    #[must_use]
    pub fn new_in(count: usize, tracking: &StateTracking) -> Self {
        let inner = Arc::new(BackingInner {
            count,
            cells: OnceLock::new(),
        });
        tracking.register(&inner);
        Self { inner }
    }

    /// Record a read of property `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the configured count.
    pub fn access(&self, index: usize) {
        self.check(index);
        if let Some(cells) = self.inner.cells.get() {
            let _ = cells[index].get();
        }
    }

    /// Record a write of property `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the configured count.
    pub fn update(&self, index: usize) {
        self.check(index);
        if let Some(cells) = self.inner.cells.get() {
            cells[index].update(|n| *n += 1);
        }
    }

    /// Number of counters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.count
    }

    /// Whether there are no counters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.count == 0
    }

    /// Whether tracking has been activated.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.inner.cells.get().is_some()
    }

    /// The cell behind property `index`, once tracking is active.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&StateCell<u64>> {
        self.inner.cells.get().and_then(|cells| cells.get(index))
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.inner.count,
            "state index {index} out of range for {} properties",
            self.inner.count
        );
    }
}

impl fmt::Debug for StateBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBacking")
            .field("count", &self.inner.count)
            .field("tracking", &self.is_tracking())
            .finish()
    }
}
