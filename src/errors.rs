use std::any::Any;
use thiserror::Error;

/// Failures surfaced by pools, registries and collection constructors.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    /// `submit` was called after `shutdown` had begun. The task never ran.
    #[error("pool closed")]
    Closed,
    /// The task panicked. The worker that ran it keeps going.
    #[error("task panicked: {0}")]
    Panic(String),
    /// The task was dropped without running (work-stealing shutdown).
    #[error("task abandoned before it was dispatched")]
    Abandoned,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("worker {index} does not exist in a pool of {num_threads}")]
    InvalidWorker { index: usize, num_threads: usize },
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),
}

impl PoolError {
    /// Builds a `Panic` error from a `catch_unwind` payload.
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        PoolError::Panic(message)
    }
}
