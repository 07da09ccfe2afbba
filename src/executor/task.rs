//! Task representation and execution.

use super::handle::{Completer, ResultHandle};
use super::panic_handler::PanicHandler;
use crate::error::TaskError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task.
///
/// Ids increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a task ended, as seen by the worker that ran it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Completed,
    Failed,
    Panicked,
}

type Invoke = Box<dyn FnOnce(&PanicHandler) -> TaskStatus + Send + 'static>;

/// Internal, type-erased task.
///
/// The closure owns the [`Completer`] of its handle. Dropping a task that
/// was never invoked drops the completer with it, which resolves the
/// handle to [`TaskError::Cancelled`].
pub(crate) struct Task {
    pub(crate) id: TaskId,
    func: Invoke,
    pub(crate) spawn_time: Instant,
}

impl Task {
    /// Package an infallible closure.
    pub fn new<F, R>(f: F) -> (Self, ResultHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        Self::fallible(move || Ok::<R, std::convert::Infallible>(f()))
    }

    /// Package a closure whose `Err` is recorded as [`TaskError::Failed`].
    pub fn fallible<F, T, E>(f: F) -> (Self, ResultHandle<T>)
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let id = TaskId::next();
        let (completer, handle) = Completer::pair(id);

        let func: Invoke = Box::new(move |panics: &PanicHandler| {
            let (outcome, status) = match panics.execute(f) {
                Ok(Ok(value)) => (Ok(value), TaskStatus::Completed),
                Ok(Err(cause)) => (Err(TaskError::failed(cause)), TaskStatus::Failed),
                Err(info) => (Err(TaskError::Panicked(info.message)), TaskStatus::Panicked),
            };
            completer.complete(outcome);
            status
        });

        let task = Task {
            id,
            func,
            spawn_time: Instant::now(),
        };
        (task, handle)
    }

    /// Execute the task, resolving its handle
    pub fn invoke(self, panics: &PanicHandler) -> TaskStatus {
        (self.func)(panics)
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("spawn_time", &self.spawn_time)
            .finish()
    }
}
