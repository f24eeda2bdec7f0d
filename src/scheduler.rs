//! Deferred-execution port.
//!
//! Cache hits and short-circuited resource loads must complete on a future
//! tick rather than inside the call that requested them, so callers can
//! treat every request as asynchronous. The engine never schedules work
//! directly; it goes through a [`Scheduler`] so embedders pick the driving
//! primitive and tests can drain deferrals deterministically.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Port for deferring work to a future tick of the host's event loop.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run later. Implementations must not run it inline.
    fn defer(&self, task: Task);
}

/// Production scheduler backed by the tokio runtime.
///
/// Must be used from within a runtime context; each deferral becomes a
/// spawned task.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        tokio::spawn(async move { task() });
    }
}

/// Deterministic scheduler that queues deferrals until explicitly drained.
///
/// Intended for tests and single-threaded embedders: nothing runs until
/// [`run`](ManualScheduler::run) or [`run_next`](ManualScheduler::run_next)
/// is called, so interleavings are fully controlled by the driver.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Task>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Number of tasks currently queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Run the oldest queued task, if any. Returns whether one ran.
    pub fn run_next(&self) -> bool {
        let task = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run queued tasks until the queue is empty, including tasks queued by
    /// the tasks themselves. Returns how many ran.
    pub fn run(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
