#![forbid(unsafe_code)]

//! Model: deferred state tracking, trackable cells, and the observed and
//! published property wrappers built on them.

pub mod backing;
pub mod object;
pub mod observed;
pub mod published;
pub mod state;
pub mod tracking;

mod sync;

pub use backing::StateBacking;
pub use object::ObservableObject;
pub use observed::Observed;
pub use published::{PropertySubject, Published};
pub use state::{CellId, StateCell, observe_reads, state_writes};
pub use tracking::{BodyScope, StateTracker, StateTracking};
