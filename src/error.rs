//! Library error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The worker pool has been shut down and accepts no more tasks.
    #[error("worker pool is stopped")]
    PoolStopped,

    /// The task was skipped because the run had already been stopped.
    #[error("cancelled")]
    Cancelled,

    #[error("sentence {index} failed: {message}")]
    TaskFailed { index: usize, message: String },

    #[error("sentence {index} panicked")]
    TaskPanicked { index: usize },

    /// The worker dropped the task without reporting a result.
    #[error("sentence {index} was lost by its worker")]
    TaskLost { index: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
