use super::{
    errors::PoolError,
    model::JoinOrdering,
    result::TaskResult,
};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::oneshot;


/// Unit of work stored in a pool queue.
pub type Job = Box<dyn FnOnce() + Send + 'static>;


/// Eventual outcome of a submitted task.
///
/// Written once by the worker that runs the task. If the task is dropped
/// without running, the handle resolves to `PoolError::Abandoned`.
///
/// The handle can be consumed from a plain thread with [`ResultHandle::wait`]
/// or awaited from async code.
pub struct ResultHandle<T> {
    receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> ResultHandle<T> {
    pub fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Blocks the current thread until the task has finished.
    ///
    /// Must not be called from inside an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> TaskResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(PoolError::Abandoned))
    }

    /// Returns the outcome if the task has already finished.
    pub fn try_result(&mut self) -> Option<TaskResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(PoolError::Abandoned)),
        }
    }
}

impl<T> Future for ResultHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(PoolError::Abandoned))),
            Poll::Pending => Poll::Pending,
        }
    }
}


/// Awaits every handle and collects the outcomes.
pub async fn join_handles<T>(handles: Vec<ResultHandle<T>>, ordering: JoinOrdering) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    match ordering {
        JoinOrdering::Ordered => futures::future::join_all(handles).await,
        JoinOrdering::UnOrdered => {
            let len = handles.len();
            let mut pending = FuturesUnordered::from_iter(handles);
            let mut results = Vec::with_capacity(len);
            while let Some(result) = pending.next().await {
                results.push(result);
            }
            results
        }
    }
}

/// Blocking counterpart of [`join_handles`] with input ordering.
pub fn wait_all<T>(handles: Vec<ResultHandle<T>>) -> Vec<TaskResult<T>> {
    handles.into_iter().map(ResultHandle::wait).collect()
}
