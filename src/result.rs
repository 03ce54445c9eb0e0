use super::errors::PoolError;

/// Outcome of a submitted task as seen through its `ResultHandle`.
pub type TaskResult<T> = Result<T, PoolError>;
