// worker thread loop
use super::panic_handler::PanicHandler;
use super::queue::TaskQueue;
use super::task::TaskStatus;
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

thread_local! {
    // address of the queue this thread serves, 0 off-pool
    static SERVING: Cell<usize> = const { Cell::new(0) };
}

/// `true` when the calling thread is a worker pulling from `queue`.
pub(crate) fn is_worker_of(queue: &Arc<TaskQueue>) -> bool {
    SERVING.with(|s| s.get() == Arc::as_ptr(queue) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerStatus {
    Idle = 0,
    Executing = 1,
    Exiting = 2,
}

impl WorkerStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerStatus::Idle,
            1 => WorkerStatus::Executing,
            _ => WorkerStatus::Exiting,
        }
    }
}

// stats for each worker
#[derive(Debug)]
pub struct WorkerState {
    status: AtomicU8,
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
    pub tasks_panicked: AtomicU64,
    pub busy_time_ns: AtomicU64,
}

impl WorkerState {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU8::new(WorkerStatus::Idle as u8),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: WorkerStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn tasks_executed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
            + self.tasks_failed.load(Ordering::Relaxed)
            + self.tasks_panicked.load(Ordering::Relaxed)
    }

    fn record(&self, status: TaskStatus, busy_ns: u64) {
        let counter = match status {
            TaskStatus::Completed => &self.tasks_completed,
            TaskStatus::Failed => &self.tasks_failed,
            TaskStatus::Panicked => &self.tasks_panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(busy_ns, Ordering::Relaxed);
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    queue: Arc<TaskQueue>,
    panics: Arc<PanicHandler>,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId, queue: Arc<TaskQueue>, panics: Arc<PanicHandler>) -> Self {
        Self {
            id,
            queue,
            panics,
            state: Arc::new(WorkerState::new()),
        }
    }

    // main loop
    pub fn run(&self) {
        SERVING.with(|s| s.set(Arc::as_ptr(&self.queue) as usize));
        tracing::debug!(worker = self.id, "worker started");

        while let Some(task) = self.queue.pop_blocking() {
            self.state.set_status(WorkerStatus::Executing);
            let id = task.id;
            let queued_for = task.spawn_time.elapsed();
            let start = Instant::now();

            let status = task.invoke(&self.panics);

            let busy = start.elapsed();
            self.state.record(status, busy.as_nanos() as u64);
            tracing::trace!(
                worker = self.id,
                task = %id,
                ?status,
                ?queued_for,
                ?busy,
                "task finished"
            );

            self.queue.task_done();
            self.state.set_status(WorkerStatus::Idle);
        }

        self.state.set_status(WorkerStatus::Exiting);
        SERVING.with(|s| s.set(0));
        tracing::debug!(worker = self.id, "worker exiting");
    }
}
