use thiserror::Error;

use crate::coordinator::RunState;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RunState,
    },

    #[error("previous batch still has {workers} worker(s) draining")]
    Draining { workers: usize },

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("coordination loop is not running")]
    Disconnected,
}

/// Failure of the transform invoker itself, as opposed to a crashed job.
#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("{0}")]
    Unusable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
