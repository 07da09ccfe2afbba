use std::sync::Arc;

pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors returned synchronously by pool lifecycle and submission calls.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool is not running")]
    NotRunning,

    #[error("pool already started")]
    AlreadyStarted,

    #[error("pool already shut down")]
    AlreadyShutdown,

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl PoolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        PoolError::Config(msg.into())
    }
}

/// Outcome of a task that did not produce a value.
///
/// Cloneable so every holder of a [`ResultHandle`](crate::ResultHandle)
/// observes the same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("task was cancelled before it ran")]
    Cancelled,

    #[error("task failed: {0}")]
    Failed(Arc<dyn std::error::Error + Send + Sync>),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("result is still shared with other handles")]
    Shared,
}

impl TaskError {
    pub fn failed<E>(cause: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        TaskError::Failed(Arc::from(cause.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}
