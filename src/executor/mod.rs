//! Task execution infrastructure.
//!
//! This module provides the worker pool and its building blocks: the
//! type-erased task, the one-shot result handle, the shared task queue and
//! the worker loop.

pub mod handle;
pub mod panic_handler;
pub mod pool;
pub(crate) mod queue;
pub mod task;
pub mod worker;

pub use handle::ResultHandle;
pub use panic_handler::{PanicHandler, PanicReport, PanicStrategy};
pub use pool::{Pool, PoolState, PoolStats, ShutdownMode};
pub use task::{TaskId, TaskStatus};
pub use worker::{WorkerId, WorkerState, WorkerStatus};

pub(crate) use task::Task;
