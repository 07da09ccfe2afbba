//! One-shot result handles.
//!
//! A [`Completer`] and its [`ResultHandle`]s share a single slot. The
//! completer writes it exactly once; handles block on or poll it.

use super::task::TaskId;
use crate::error::TaskError;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

enum Outcome<R> {
    Pending,
    Ready(Result<R, TaskError>),
    Taken,
}

struct Slot<R> {
    id: TaskId,
    outcome: Mutex<Outcome<R>>,
    resolved: Condvar,
    readers: AtomicUsize,
}

impl<R> Slot<R> {
    fn resolve(&self, result: Result<R, TaskError>) {
        let mut outcome = self.outcome.lock();
        assert!(
            matches!(*outcome, Outcome::Pending),
            "result for task {} written twice",
            self.id
        );
        *outcome = Outcome::Ready(result);
        drop(outcome);
        self.resolved.notify_all();
    }
}

/// Writer side of a result slot, owned by the task it belongs to.
///
/// Dropping a completer that was never completed resolves the slot to
/// [`TaskError::Cancelled`].
pub(crate) struct Completer<R> {
    slot: Option<Arc<Slot<R>>>,
}

impl<R> Completer<R> {
    pub(crate) fn pair(id: TaskId) -> (Completer<R>, ResultHandle<R>) {
        let slot = Arc::new(Slot {
            id,
            outcome: Mutex::new(Outcome::Pending),
            resolved: Condvar::new(),
            readers: AtomicUsize::new(1),
        });
        let completer = Completer {
            slot: Some(slot.clone()),
        };
        (completer, ResultHandle { slot })
    }

    pub(crate) fn complete(mut self, result: Result<R, TaskError>) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(result);
        }
    }
}

impl<R> Drop for Completer<R> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            tracing::trace!(task = %slot.id, "task dropped before running");
            slot.resolve(Err(TaskError::Cancelled));
        }
    }
}

/// Caller-visible handle to the eventual outcome of a submitted task.
///
/// Handles are cheap to clone; every clone observes the same outcome. The
/// reading methods clone the stored value, use [`join`](Self::join) to move
/// it out instead.
pub struct ResultHandle<R> {
    slot: Arc<Slot<R>>,
}

impl<R> ResultHandle<R> {
    pub fn task_id(&self) -> TaskId {
        self.slot.id
    }

    /// `true` once the task has a value, an error, or was cancelled.
    pub fn is_ready(&self) -> bool {
        !matches!(*self.slot.outcome.lock(), Outcome::Pending)
    }

    /// Block until resolved, then move the value out.
    ///
    /// Fails with [`TaskError::Shared`] if other clones of this handle are
    /// still alive, since they may still read the value.
    pub fn join(self) -> Result<R, TaskError> {
        let mut outcome = self.slot.outcome.lock();
        while matches!(*outcome, Outcome::Pending) {
            self.slot.resolved.wait(&mut outcome);
        }

        if self.slot.readers.load(Ordering::Acquire) > 1 {
            return Err(TaskError::Shared);
        }

        match std::mem::replace(&mut *outcome, Outcome::Taken) {
            Outcome::Ready(result) => result,
            // only reachable through this handle, which join consumes
            Outcome::Pending | Outcome::Taken => Err(TaskError::Cancelled),
        }
    }
}

impl<R: Clone> ResultHandle<R> {
    /// Non-blocking poll. `None` means the task has not finished yet.
    pub fn get(&self) -> Option<Result<R, TaskError>> {
        read(&self.slot.outcome.lock())
    }

    /// Block the calling thread until the task has been resolved.
    pub fn wait(&self) -> Result<R, TaskError> {
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = read(&outcome) {
                return result;
            }
            self.slot.resolved.wait(&mut outcome);
        }
    }

    /// Wait at most `timeout`. `None` means the task is not ready yet.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<R, TaskError>> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_deadline(deadline),
            None => Some(self.wait()),
        }
    }

    /// Wait until `deadline`. `None` means the task is not ready yet.
    pub fn wait_deadline(&self, deadline: Instant) -> Option<Result<R, TaskError>> {
        let mut outcome = self.slot.outcome.lock();
        loop {
            if let Some(result) = read(&outcome) {
                return Some(result);
            }
            if self.slot.resolved.wait_until(&mut outcome, deadline).timed_out() {
                return read(&outcome);
            }
        }
    }
}

fn read<R: Clone>(outcome: &Outcome<R>) -> Option<Result<R, TaskError>> {
    match outcome {
        Outcome::Pending => None,
        Outcome::Ready(result) => Some(result.clone()),
        Outcome::Taken => Some(Err(TaskError::Cancelled)),
    }
}

impl<R> Clone for ResultHandle<R> {
    fn clone(&self) -> Self {
        self.slot.readers.fetch_add(1, Ordering::AcqRel);
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<R> Drop for ResultHandle<R> {
    fn drop(&mut self) {
        self.slot.readers.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<R> std::fmt::Debug for ResultHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("task", &self.slot.id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
