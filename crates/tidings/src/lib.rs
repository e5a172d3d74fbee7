#![forbid(unsafe_code)]

//! Tidings public facade crate.
//!
//! Reactive publishers with identity-keyed subscription tokens, operators
//! and schedulers from `tidings-core`, plus deferred state tracking and
//! observable models from `tidings-model`.

pub use tidings_core::{
    AnyCancellable, AnyPublisher, Cancellable, CancellableSet, ConnectablePublisher, Never,
    Notification, NotificationCenter, ObservableObjectPublisher, PassthroughSubject, Publisher,
    PublisherExt, Scheduler, Subject, Timer,
};
pub use tidings_core::{ImmediateScheduler, LabScheduler, RunLoop, RunLoopConfig, TaskHandle};
pub use tidings_model::{
    ObservableObject, Observed, PropertySubject, Published, StateBacking, StateTracker,
    StateTracking,
};

/// Everything an application usually needs, plus `core` and `model` aliases
/// for reaching the member crates.
///
/// ```
/// use tidings::prelude::*;
///
/// let subject = PassthroughSubject::<u8>::new();
/// let _token = subject.sink(|_| {});
/// assert_eq!(subject.subscriber_count(), 1);
/// assert_eq!(model::StateTracking::new().depth(), 0);
/// ```
pub mod prelude {
    pub use tidings_core as core;
    pub use tidings_model as model;

    pub use tidings_core::prelude::*;
    pub use tidings_model::{ObservableObject, Observed, Published, StateTracking};
}
