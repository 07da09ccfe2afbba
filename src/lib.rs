//! fixpool - a fixed-size worker pool with one-shot result handles
//!
//! Tasks of any result type are submitted to a pool of OS threads that pull
//! from one shared FIFO queue. Each submission returns a [`ResultHandle`]
//! that resolves exactly once, to the task's value, to its error, or to
//! [`TaskError::Cancelled`] if shutdown discarded it.
//!
//! # Quick Start
//!
//! ```no_run
//! use fixpool::prelude::*;
//!
//! let pool = Pool::new(3)?;
//! pool.start()?;
//!
//! let square = pool.submit(|| 4 * 4)?;
//! let parse = pool.submit_fallible(|| "x1".parse::<u32>());
//!
//! assert_eq!(square.wait().unwrap(), 16);
//! assert!(parse?.wait().is_err());
//!
//! pool.shutdown(ShutdownMode::Graceful);
//! # Ok::<(), PoolError>(())
//! ```
//!
//! # Lifecycle
//!
//! - `Created`: tasks may be queued, nothing runs.
//! - `Running`: after [`Pool::start`], workers pull tasks in FIFO order.
//! - `Draining`: [`Pool::shutdown`] began; submissions fail with
//!   [`PoolError::NotRunning`]. [`ShutdownMode::Graceful`] runs what is
//!   queued, [`ShutdownMode::Immediate`] cancels it.
//! - `Stopped`: every worker thread has been joined.
//!
//! Dropping a pool that was not shut down performs
//! [`Config::drop_mode`](Config) shutdown, graceful by default.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;

pub use config::{Config, ConfigBuilder};
pub use error::{PoolError, Result, TaskError};
pub use executor::{
    PanicStrategy, Pool, PoolState, PoolStats, ResultHandle, ShutdownMode, TaskId,
};
