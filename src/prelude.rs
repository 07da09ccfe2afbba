pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{PoolError, Result, TaskError};
pub use crate::executor::{PanicStrategy, Pool, PoolState, ResultHandle, ShutdownMode};
