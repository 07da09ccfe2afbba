//! Shared FIFO of pending tasks.
//!
//! The pending tasks, the pool lifecycle state and the in-flight count all
//! live behind one mutex. Workers, submitters and the shutdown path only
//! ever observe them together, so a worker can never see the pool as
//! running with a stale view of the queue or the other way round.

use super::pool::{PoolState, ShutdownMode};
use super::task::Task;
use crate::error::{PoolError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct Inner {
    tasks: VecDeque<Task>,
    state: PoolState,
    in_flight: usize,
}

impl Inner {
    fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.in_flight == 0
    }
}

pub(crate) struct TaskQueue {
    inner: Mutex<Inner>,
    /// Signalled on push and on every state change workers care about.
    available: Condvar,
    /// Signalled when the queue empties with nothing in flight.
    idle: Condvar,
    stopped: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: VecDeque::new(),
                state: PoolState::Created,
                in_flight: 0,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            stopped: Condvar::new(),
        }
    }

    /// Append to the tail. Rejected tasks are handed back once the pool
    /// has started shutting down.
    pub fn push(&self, task: Task) -> std::result::Result<(), Task> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            PoolState::Created | PoolState::Running => {
                inner.tasks.push_back(task);
                drop(inner);
                self.available.notify_one();
                Ok(())
            }
            PoolState::Draining | PoolState::Stopped => Err(task),
        }
    }

    /// Remove the head, blocking while the queue is empty and the pool is
    /// not shutting down. `None` tells the worker to exit.
    pub fn pop_blocking(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        loop {
            let state = inner.state;
            match state {
                PoolState::Running | PoolState::Draining => {
                    if let Some(task) = inner.tasks.pop_front() {
                        inner.in_flight += 1;
                        return Some(task);
                    }
                    if state == PoolState::Draining {
                        return None;
                    }
                }
                PoolState::Stopped => return None,
                PoolState::Created => {}
            }
            self.available.wait(&mut inner);
        }
    }

    /// Non-blocking pop. Never hands out tasks before the pool is running.
    #[cfg(test)]
    pub fn try_pop(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            PoolState::Running | PoolState::Draining => {
                let task = inner.tasks.pop_front()?;
                inner.in_flight += 1;
                Some(task)
            }
            PoolState::Created | PoolState::Stopped => None,
        }
    }

    /// Called by a worker once a popped task has finished.
    pub fn task_done(&self) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.in_flight > 0, "task_done without a popped task");
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.is_idle() {
            drop(inner);
            self.idle.notify_all();
        }
    }

    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            PoolState::Created => {
                inner.state = PoolState::Running;
                drop(inner);
                self.available.notify_all();
                Ok(())
            }
            PoolState::Running => Err(PoolError::AlreadyStarted),
            PoolState::Draining | PoolState::Stopped => Err(PoolError::AlreadyShutdown),
        }
    }

    /// Stop accepting tasks and move to `Draining`.
    ///
    /// Returns the tasks discarded by the drain policy, or `None` if
    /// shutdown had already begun. A pool that never started has no worker
    /// to run its queue, so everything queued is discarded in either mode.
    pub fn close(&self, mode: ShutdownMode) -> Option<Vec<Task>> {
        let mut inner = self.inner.lock();
        let discard = match inner.state {
            PoolState::Created => true,
            PoolState::Running => mode == ShutdownMode::Immediate,
            PoolState::Draining | PoolState::Stopped => return None,
        };

        inner.state = PoolState::Draining;
        let discarded: Vec<Task> = if discard {
            inner.tasks.drain(..).collect()
        } else {
            Vec::new()
        };
        let idle = inner.is_idle();
        drop(inner);

        self.available.notify_all();
        if idle {
            self.idle.notify_all();
        }
        Some(discarded)
    }

    pub fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.state = PoolState::Stopped;
        drop(inner);
        self.available.notify_all();
        self.idle.notify_all();
        self.stopped.notify_all();
    }

    pub fn wait_stopped(&self) {
        let mut inner = self.inner.lock();
        while inner.state != PoolState::Stopped {
            self.stopped.wait(&mut inner);
        }
    }

    /// Block until nothing is queued or running. Only a running or
    /// draining pool has workers to get there, so any other state returns
    /// at once.
    pub fn wait_idle(&self) {
        let mut inner = self.inner.lock();
        while !inner.is_idle()
            && matches!(inner.state, PoolState::Running | PoolState::Draining)
        {
            self.idle.wait(&mut inner);
        }
    }

    pub fn state(&self) -> PoolState {
        self.inner.lock().state
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().in_flight
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TaskQueue")
            .field("state", &inner.state)
            .field("len", &inner.tasks.len())
            .field("in_flight", &inner.in_flight)
            .finish()
    }
}
