#![forbid(unsafe_code)]

//! A dedicated scheduler thread.
//!
//! [`RunLoop`] owns one thread that executes scheduled work in deadline
//! order. Hosts typically start one and treat it as the designated context
//! for UI-affecting delivery: [`ReceiveOn`](crate::operators::ReceiveOn)
//! delivers inline when already on the loop thread and redispatches
//! otherwise.
//!
//! # Shutdown
//!
//! [`shutdown`](RunLoop::shutdown) stops the thread after the message that is
//! currently being processed; queued work that has not come due is dropped.
//! Dropping the last handle shuts the loop down as well.
//!
//! # Failure Modes
//!
//! - **Work panics**: the panic is caught, logged at `ERROR`, and the loop
//!   keeps running.
//! - **Scheduling after shutdown**: [`try_schedule_after`] returns
//!   [`RunLoopError::Stopped`]; the [`Scheduler`] impl logs a warning and
//!   hands back an already-cancelled handle.
//!
//! [`try_schedule_after`]: RunLoop::try_schedule_after

use std::env;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use web_time::{Duration, Instant};

use super::queue::TaskQueue;
use super::{Scheduler, TaskHandle, Work};
use crate::sync::lock;

/// Environment variable overriding the loop thread's name.
pub const RUN_LOOP_NAME_ENV: &str = "TIDINGS_RUNLOOP_NAME";

/// Configuration for a [`RunLoop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLoopConfig {
    /// Name given to the loop thread.
    pub thread_name: String,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            thread_name: "tidings-runloop".to_string(),
        }
    }
}

impl RunLoopConfig {
    /// Defaults, overridden by `TIDINGS_RUNLOOP_NAME` when set and non-empty.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var(RUN_LOOP_NAME_ENV)
            && !name.trim().is_empty()
        {
            config.thread_name = name;
        }
        config
    }

    /// Set the loop thread's name.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Error returned when work cannot be handed to a [`RunLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunLoopError {
    /// The loop thread has shut down.
    Stopped,
}

impl fmt::Display for RunLoopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "run loop stopped"),
        }
    }
}

impl std::error::Error for RunLoopError {}

enum LoopMsg {
    Schedule {
        deadline: Instant,
        handle: TaskHandle,
        work: Work,
    },
    Shutdown,
}

struct LoopInner {
    sender: Mutex<Option<mpsc::Sender<LoopMsg>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    name: String,
}

impl LoopInner {
    fn stop(&self) {
        if let Some(sender) = lock(&self.sender).take() {
            let _ = sender.send(LoopMsg::Shutdown);
        }
        // Joining from the loop thread itself would never return.
        if thread::current().id() == self.thread_id {
            return;
        }
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for LoopInner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle to a running scheduler thread.
///
/// Cheaply cloneable; all clones drive the same thread.
#[derive(Clone)]
pub struct RunLoop {
    inner: Arc<LoopInner>,
}

impl RunLoop {
    /// Spawn the loop thread.
    pub fn start(config: RunLoopConfig) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel::<LoopMsg>();
        let name = config.thread_name;
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(rx))?;
        let thread_id = handle.thread().id();
        tracing::debug!(message = "runloop.start", name = %name);

        Ok(Self {
            inner: Arc::new(LoopInner {
                sender: Mutex::new(Some(tx)),
                handle: Mutex::new(Some(handle)),
                thread_id,
                name,
            }),
        })
    }

    /// Spawn a loop with [`RunLoopConfig::from_env`].
    pub fn start_default() -> io::Result<Self> {
        Self::start(RunLoopConfig::from_env())
    }

    /// Queue `work` to run after `delay`.
    pub fn try_schedule_after(&self, delay: Duration, work: Work) -> Result<TaskHandle, RunLoopError> {
        let handle = TaskHandle::new();
        let msg = LoopMsg::Schedule {
            deadline: Instant::now() + delay,
            handle: handle.clone(),
            work,
        };
        let sender = lock(&self.inner.sender);
        match sender.as_ref() {
            Some(sender) => sender.send(msg).map_err(|_| RunLoopError::Stopped)?,
            None => return Err(RunLoopError::Stopped),
        }
        Ok(handle)
    }

    /// Identifier of the loop thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.inner.thread_id
    }

    /// Whether the loop still accepts work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.inner.sender).is_some()
    }

    /// Stop the loop thread and wait for it to exit.
    ///
    /// Safe to call more than once and from any clone. When called from the
    /// loop thread itself it only signals the loop to stop.
    pub fn shutdown(&self) {
        tracing::debug!(message = "runloop.shutdown", name = %self.inner.name);
        self.inner.stop();
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler for RunLoop {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn schedule_after(&self, delay: Duration, work: Work) -> TaskHandle {
        match self.try_schedule_after(delay, work) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(message = "runloop.schedule_rejected", name = %self.inner.name, %err);
                TaskHandle::cancelled()
            }
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }
}

/// The loop thread's body.
///
/// Waits for the next message or the next deadline, whichever comes first,
/// then runs everything that is due.
fn run_loop(rx: mpsc::Receiver<LoopMsg>) {
    let mut queue = TaskQueue::default();
    loop {
        let msg = match queue.next_deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(msg) => Some(msg),
                Err(_) => return,
            },
        };

        match msg {
            Some(LoopMsg::Schedule {
                deadline,
                handle,
                work,
            }) => queue.push(deadline, handle, work),
            Some(LoopMsg::Shutdown) => return,
            None => {}
        }

        while let Some((_, work)) = queue.pop_due(Instant::now()) {
            if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
                tracing::error!(message = "runloop.work_panicked");
            }
        }
    }
}
