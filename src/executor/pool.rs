use super::handle::ResultHandle;
use super::panic_handler::PanicHandler;
use super::queue::TaskQueue;
use super::task::Task;
use super::worker::{self, Worker, WorkerId, WorkerState, WorkerStatus};
use crate::config::Config;
use crate::error::{PoolError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Built, accepting submissions, no worker threads yet.
    Created,
    Running,
    /// Shutdown has begun; submissions are rejected.
    Draining,
    /// Every worker thread has been joined.
    Stopped,
}

/// Drain policy applied by [`Pool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Run everything already queued, then stop.
    #[default]
    Graceful,
    /// Cancel everything not yet started; only tasks already picked up by
    /// a worker finish.
    Immediate,
}

/// Point-in-time counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub cancelled: u64,
    pub queued: usize,
    pub in_flight: usize,
    /// Time workers spent running tasks, summed over all workers.
    pub busy_time: Duration,
}

/// A fixed-size pool of worker threads sharing one FIFO queue.
///
/// Every submission hands back a [`ResultHandle`] that is resolved exactly
/// once: with the task's value, with its error, or with
/// [`TaskError::Cancelled`](crate::TaskError::Cancelled) when an immediate
/// shutdown discards it.
///
/// ```no_run
/// use fixpool::{Pool, ShutdownMode};
///
/// let pool = Pool::new(3)?;
/// let square = pool.submit(|| 4 * 4)?;
/// pool.start()?;
///
/// assert_eq!(square.wait().unwrap(), 16);
/// pool.shutdown(ShutdownMode::Graceful);
/// # Ok::<(), fixpool::PoolError>(())
/// ```
pub struct Pool {
    queue: Arc<TaskQueue>,
    panics: Arc<PanicHandler>,
    workers: Mutex<Vec<WorkerHandle>>,
    num_threads: usize,
    config: Config,
    submitted: AtomicU64,
    cancelled: AtomicU64,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    state: Arc<WorkerState>,
}

impl Pool {
    /// Pool with `worker_count` threads and default settings otherwise.
    pub fn new(worker_count: usize) -> Result<Self> {
        let config = Config::builder().num_threads(worker_count).build()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(PoolError::config("need at least 1 thread"));
        }

        Ok(Self {
            queue: Arc::new(TaskQueue::new()),
            panics: Arc::new(PanicHandler::new(config.panic_strategy)),
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
            config,
            submitted: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
        })
    }

    /// Spawn the worker threads and begin executing queued tasks.
    ///
    /// Fails with [`PoolError::AlreadyStarted`] on a running pool and with
    /// [`PoolError::AlreadyShutdown`] once shutdown has begun.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        self.queue.start()?;

        for id in 0..self.num_threads {
            let worker = Worker::new(id, self.queue.clone(), self.panics.clone());
            let state = worker.state.clone();

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, id));
            if let Some(stack_size) = self.config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            match builder.spawn(move || worker.run()) {
                Ok(thread) => workers.push(WorkerHandle {
                    id,
                    thread: Some(thread),
                    state,
                }),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to spawn worker thread");
                    if let Some(discarded) = self.queue.close(ShutdownMode::Immediate) {
                        self.record_cancelled(discarded);
                    }
                    let threads = take_threads(&mut workers);
                    drop(workers);
                    join_all(threads);
                    self.queue.mark_stopped();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        tracing::debug!(
            workers = self.num_threads,
            panic_strategy = ?self.panics.strategy(),
            "pool started"
        );
        Ok(())
    }

    /// Queue `f` and return a handle to its result.
    ///
    /// Accepted before [`start`](Self::start) as well; such tasks wait in
    /// the queue. Fails with [`PoolError::NotRunning`] once shutdown has
    /// begun.
    pub fn submit<F, R>(&self, f: F) -> Result<ResultHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = Task::new(f);
        self.enqueue(task)?;
        Ok(handle)
    }

    /// Like [`submit`](Self::submit), for tasks that report their own
    /// errors. An `Err` resolves the handle to
    /// [`TaskError::Failed`](crate::TaskError::Failed).
    pub fn submit_fallible<F, T, E>(&self, f: F) -> Result<ResultHandle<T>>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (task, handle) = Task::fallible(f);
        self.enqueue(task)?;
        Ok(handle)
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        let id = task.id;
        match self.queue.push(task) {
            Ok(()) => {
                self.submitted.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(task = %id, "task queued");
                Ok(())
            }
            Err(_rejected) => {
                tracing::debug!(task = %id, "submission rejected, pool is shutting down");
                Err(PoolError::NotRunning)
            }
        }
    }

    /// Stop the pool and block until every worker thread has exited.
    ///
    /// Only the first call does any work. Later calls return once the pool
    /// has reached [`PoolState::Stopped`], except when made from one of this
    /// pool's own workers: those return at once, since the first caller may
    /// be waiting to join that very thread.
    pub fn shutdown(&self, mode: ShutdownMode) {
        let discarded = match self.queue.close(mode) {
            Some(discarded) => discarded,
            None => {
                if !worker::is_worker_of(&self.queue) {
                    self.queue.wait_stopped();
                }
                return;
            }
        };
        tracing::debug!(?mode, "pool shutting down");

        if !discarded.is_empty() {
            tracing::warn!(count = discarded.len(), "cancelling queued tasks");
        }
        self.record_cancelled(discarded);

        // join outside the lock; running tasks may still read stats
        let threads = take_threads(&mut self.workers.lock());
        join_all(threads);
        self.queue.mark_stopped();
        tracing::debug!("pool stopped");
    }

    fn record_cancelled(&self, discarded: Vec<Task>) {
        self.cancelled
            .fetch_add(discarded.len() as u64, Ordering::Relaxed);
        // dropping resolves each handle to Cancelled
        drop(discarded);
    }

    /// Block until the queue is empty and no task is running.
    ///
    /// Returns at once on a pool that was never started, since nothing
    /// would drain its queue, and on a stopped pool.
    pub fn wait_idle(&self) {
        self.queue.wait_idle();
    }

    pub fn state(&self) -> PoolState {
        self.queue.state()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Status of each spawned worker, in worker id order.
    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.workers.lock().iter().map(|w| w.state.status()).collect()
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            queued: self.queue.len(),
            in_flight: self.queue.in_flight(),
            ..PoolStats::default()
        };

        for worker in self.workers.lock().iter() {
            stats.completed += worker.state.tasks_completed.load(Ordering::Relaxed);
            stats.failed += worker.state.tasks_failed.load(Ordering::Relaxed);
            stats.panicked += worker.state.tasks_panicked.load(Ordering::Relaxed);
            stats.busy_time +=
                Duration::from_nanos(worker.state.busy_time_ns.load(Ordering::Relaxed));
        }
        stats
    }
}

fn take_threads(workers: &mut [WorkerHandle]) -> Vec<(WorkerId, JoinHandle<()>)> {
    workers
        .iter_mut()
        .filter_map(|w| w.thread.take().map(|t| (w.id, t)))
        .collect()
}

fn join_all(threads: Vec<(WorkerId, JoinHandle<()>)>) {
    let current = thread::current().id();

    for (id, thread) in threads {
        if thread.thread().id() == current {
            // shutdown reached from inside a task; this thread exits on its
            // own once its loop sees the closed queue
            tracing::debug!(worker = id, "skipping join of current worker");
            continue;
        }
        if thread.join().is_err() {
            tracing::error!(worker = id, "worker thread panicked");
        }
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.shutdown(self.config.drop_mode);
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("num_threads", &self.num_threads)
            .field("queue", &self.queue)
            .finish()
    }
}
