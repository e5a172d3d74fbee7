#![forbid(unsafe_code)]

//! Core: subscription tokens, fan-out subjects, operators, schedulers, the
//! periodic timer and the notification bus.

pub mod cancellable;
pub mod fanout;
pub mod notification;
pub mod operators;
pub mod publisher;
pub mod scheduler;
pub mod subject;
pub mod timer;

mod sync;

pub use cancellable::{AnyCancellable, Cancellable, CancellableSet};
pub use fanout::Fanout;
pub use notification::{
    Notification, NotificationCenter, NotificationName, NotificationPublisher, ObjectId,
    ObserverId,
};
pub use publisher::{
    AnyPublisher, ConnectablePublisher, Never, Publisher, PublisherExt, Receiver, Subject,
};
pub use scheduler::{
    ImmediateScheduler, LabScheduler, RunLoop, RunLoopConfig, RunLoopError, Scheduler, TaskHandle,
};
pub use subject::{ObservableObjectPublisher, PassthroughSubject};
pub use timer::{SchedulerTicks, TickSource, Timer, TimerPublisher};

/// The traits and types most code needs.
pub mod prelude {
    pub use crate::cancellable::{AnyCancellable, Cancellable, CancellableSet};
    pub use crate::publisher::{
        AnyPublisher, ConnectablePublisher, Never, Publisher, PublisherExt, Subject,
    };
    pub use crate::scheduler::Scheduler;
    pub use crate::subject::{ObservableObjectPublisher, PassthroughSubject};
}
