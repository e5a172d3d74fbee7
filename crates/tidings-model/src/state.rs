//! Trackable state cells.
//!
//! A [`StateCell`] is a value whose reads and writes are visible to an
//! observer: reads made inside [`observe_reads`] are recorded, and every
//! write is announced on the process-wide [`state_writes`] stream. Hosts use
//! the two together to learn which cells a body depends on and when to run
//! it again.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use tidings_core::{PassthroughSubject, Subject};

use crate::sync::lock;

/// Process-unique identity of a [`StateCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

thread_local! {
    static READS: RefCell<Vec<AHashSet<CellId>>> = const { RefCell::new(Vec::new()) };
}

fn record_read(id: CellId) {
    READS.with(|reads| {
        if let Some(top) = reads.borrow_mut().last_mut() {
            top.insert(id);
        }
    });
}

/// Pops the read frame pushed by [`observe_reads`], even on unwind.
struct ReadFrame;

impl ReadFrame {
    fn finish(self) -> AHashSet<CellId> {
        let reads = READS.with(|reads| reads.borrow_mut().pop()).unwrap_or_default();
        std::mem::forget(self);
        // Reads of a nested observation are reads of the enclosing one too.
        READS.with(|stack| {
            if let Some(outer) = stack.borrow_mut().last_mut() {
                outer.extend(reads.iter().copied());
            }
        });
        reads
    }
}

impl Drop for ReadFrame {
    fn drop(&mut self) {
        READS.with(|reads| {
            reads.borrow_mut().pop();
        });
    }
}

/// Run `f`, returning its result and the cells read on this thread while it
/// ran.
///
/// Observations nest: reads made inside an inner call are reported to both
/// the inner and the outer caller.
pub fn observe_reads<R>(f: impl FnOnce() -> R) -> (R, AHashSet<CellId>) {
    READS.with(|reads| reads.borrow_mut().push(AHashSet::new()));
    let frame = ReadFrame;
    let out = f();
    (out, frame.finish())
}

/// Stream of ids of cells that were written, in write order.
#[must_use]
pub fn state_writes() -> &'static PassthroughSubject<CellId> {
    static WRITES: OnceLock<PassthroughSubject<CellId>> = OnceLock::new();
    WRITES.get_or_init(PassthroughSubject::new)
}

/// A value whose reads and writes are observable.
pub struct StateCell<T> {
    id: CellId,
    value: Mutex<T>,
    version: AtomicU64,
}

impl<T> StateCell<T> {
    /// Wrap `value` in a fresh cell.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            id: CellId::next(),
            value: Mutex::new(value),
            version: AtomicU64::new(0),
        }
    }

    /// This cell's identity.
    #[must_use]
    pub fn id(&self) -> CellId {
        self.id
    }

    /// Number of writes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Borrow the value, recording the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        record_read(self.id);
        f(&*lock(&self.value))
    }

    /// Replace the value and announce the write.
    pub fn set(&self, value: T) {
        *lock(&self.value) = value;
        self.wrote();
    }

    /// Modify the value in place and announce the write.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut *lock(&self.value));
        self.wrote();
    }

    fn wrote(&self) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(message = "state.write", cell = self.id.0, version);
        state_writes().send(self.id);
    }
}

impl<T: Clone> StateCell<T> {
    /// Read the value, recording the read.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Read the value without recording the read.
    #[must_use]
    pub fn get_untracked(&self) -> T {
        lock(&self.value).clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for StateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCell")
            .field("id", &self.id)
            .field("value", &*lock(&self.value))
            .field("version", &self.version())
            .finish()
    }
}
