//! Single locked queue drained by every worker (basic and priority pools).

use super::PoolStats;
use crate::{errors::PoolError, handle::Job};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;


/// Storage discipline behind a `SharedQueue`.
pub(crate) trait JobQueue: Send + 'static {
    type Item: Send;

    fn push(&mut self, item: Self::Item);
    fn pop(&mut self) -> Option<Job>;
    fn len(&self) -> usize;
}


pub(crate) struct SharedQueue<Q> {
    queue: Mutex<Q>,
    available: Condvar,
    shutdown: CancellationToken,
    pub(crate) stats: PoolStats,
}

impl<Q: JobQueue> SharedQueue<Q> {
    pub(crate) fn new(queue: Q) -> Self {
        Self {
            queue: Mutex::new(queue),
            available: Condvar::new(),
            shutdown: CancellationToken::new(),
            stats: PoolStats::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Q> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The shutdown flag is read under the queue lock, so nothing can be
    /// enqueued after `close` has returned.
    pub(crate) fn push(&self, item: Q::Item) -> Result<(), PoolError> {
        {
            let mut queue = self.lock();
            if self.shutdown.is_cancelled() {
                return Err(PoolError::Closed);
            }
            queue.push(item);
        }
        self.stats.record_submit();
        self.available.notify_one();
        Ok(())
    }

    pub(crate) fn close(&self) {
        {
            let _queue = self.lock();
            self.shutdown.cancel();
        }
        self.available.notify_all();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_signal(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Worker body. A woken worker takes a job before it looks at the
    /// shutdown flag, so everything enqueued before `close` still runs.
    pub(crate) fn worker_loop(&self) {
        loop {
            let job = {
                let mut queue = self.lock();
                loop {
                    if let Some(job) = queue.pop() {
                        break Some(job);
                    }
                    if self.shutdown.is_cancelled() {
                        break None;
                    }
                    self.stats.enter_idle();
                    queue = self.available.wait(queue).unwrap_or_else(PoisonError::into_inner);
                    self.stats.leave_idle();
                }
            };

            match job {
                Some(job) => self.stats.run(job),
                None => break,
            }
        }
    }
}
