//! Cooperative task scheduler over a fixed worker pool.
//!
//! Tasks are futures running on a multi-threaded tokio runtime with a fixed
//! number of workers. Every task is tracked so [`Scheduler::join`] can wait
//! for all of them, including tasks spawned from completion handlers.
//!
//! Stopping is cooperative. [`SchedulerHandle::stop`] flips a shared token
//! that tasks observe at their suspension points; nothing is aborted.
//! A task that returns an error or panics without a handler stops the whole
//! pipeline and is remembered as the failure reason.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::error::SchedulerError;

/// How long runtime shutdown waits for stray blocking work after all tasks
/// have completed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// A task that panicked instead of completing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task panicked: {message}")]
pub struct TaskPanic {
    pub message: String,
}

impl TaskPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Owner of the worker pool.
pub struct Scheduler {
    runtime: Runtime,
    handle: SchedulerHandle,
}

impl Scheduler {
    /// Start a pool with `worker_threads` workers (at least one).
    pub fn new(worker_threads: usize) -> Result<Self, SchedulerError> {
        let worker_threads = worker_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("evcapture-worker")
            .enable_all()
            .build()?;

        let handle = SchedulerHandle {
            runtime: runtime.handle().clone(),
            tracker: TaskTracker::new(),
            stop: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
        };
        debug!(worker_threads, "scheduler started");

        Ok(Self { runtime, handle })
    }

    /// Cloneable handle for spawning and stopping from inside tasks.
    pub fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    pub fn spawn<F, T, E>(&self, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.handle.spawn(task);
    }

    pub fn spawn_with<F, H>(&self, task: F, on_complete: H)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        H: FnOnce(Result<F::Output, TaskPanic>) + Send + 'static,
    {
        self.handle.spawn_with(task, on_complete);
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Block until every task has completed, then shut the pool down.
    ///
    /// Must not be called from inside a task.
    pub fn join(self) {
        let Scheduler { runtime, handle } = self;
        handle.tracker.close();
        runtime.block_on(handle.tracker.wait());
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        debug!("scheduler joined");
    }
}

/// Shared view of a [`Scheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    runtime: Handle,
    tracker: TaskTracker,
    stop: CancellationToken,
    failure: Arc<Mutex<Option<String>>>,
}

impl SchedulerHandle {
    /// Run `task` on the pool. An error result stops the pipeline.
    pub fn spawn<F, T, E>(&self, task: F)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let this = self.clone();
        self.spawn_with(task, move |outcome| {
            if let Ok(Err(err)) = outcome {
                this.fail(err.to_string());
            }
        });
    }

    /// Run `task` on the pool and hand its output to `on_complete`.
    ///
    /// The handler runs on a worker thread. A panicking task stops the
    /// pipeline before the handler sees the [`TaskPanic`].
    pub fn spawn_with<F, H>(&self, task: F, on_complete: H)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        H: FnOnce(Result<F::Output, TaskPanic>) + Send + 'static,
    {
        let this = self.clone();
        self.tracker.spawn_on(
            async move {
                let outcome = AssertUnwindSafe(task)
                    .catch_unwind()
                    .await
                    .map_err(TaskPanic::from_payload);
                if let Err(panic) = &outcome {
                    this.fail(panic.to_string());
                }
                on_complete(outcome);
            },
            &self.runtime,
        );
    }

    /// Ask every task to finish. Idempotent.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            info!("stop requested");
        }
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        self.stop.cancelled().await;
    }

    /// First unhandled task error, if any.
    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }

    pub(crate) fn fail(&self, reason: String) {
        error!(error = %reason, "unhandled task error, stopping pipeline");
        self.failure.lock().get_or_insert(reason);
        self.stop();
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("tasks", &self.tracker.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Handle on the current runtime, for driving tasks from `#[tokio::test]`.
    pub fn detached_handle() -> SchedulerHandle {
        SchedulerHandle {
            runtime: Handle::current(),
            tracker: TaskTracker::new(),
            stop: CancellationToken::new(),
            failure: Arc::new(Mutex::new(None)),
        }
    }
}
