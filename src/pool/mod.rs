//! OS-thread pools sharing one submission contract.
//!
//! | pool | queue | idle workers | on shutdown |
//! |------|-------|--------------|-------------|
//! | [`BasicThreadPool`] | shared FIFO | block on a condvar | drain |
//! | [`PriorityThreadPool`] | shared heap | block on a condvar | drain |
//! | [`WorkStealingThreadPool`] | one deque per worker | sleep and poll | abandon queued tasks |

mod shared;

pub mod basic;
pub mod priority;
pub mod work_stealing;

pub use basic::BasicThreadPool;
pub use priority::PriorityThreadPool;
pub use work_stealing::WorkStealingThreadPool;

use super::{
    errors::PoolError,
    handle::{Job, ResultHandle},
    model::{PoolKind, PoolMetrics},
};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle, ThreadId},
    time::Duration,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};


/// Pool construction parameters.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,
    /// How long an idle work-stealing worker sleeps before polling again.
    pub idle_sleep: Duration,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name: "conflux-worker".to_string(),
            idle_sleep: Duration::from_millis(1),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self {
            num_threads: num_cpus::get(),
            idle_sleep: Duration::from_micros(200),
            ..Default::default()
        }
    }

    /// Twice the core count: tasks are expected to block on I/O.
    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2,
            idle_sleep: Duration::from_millis(2),
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    pub fn with_idle_sleep(mut self, idle_sleep: Duration) -> Self {
        self.idle_sleep = idle_sleep;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_threads == 0 {
            return Err(PoolError::InvalidConfig("num_threads must be at least 1".into()));
        }
        if self.thread_name.is_empty() {
            return Err(PoolError::InvalidConfig("thread_name must not be empty".into()));
        }
        Ok(())
    }

    fn thread_builder(&self, index: usize) -> thread::Builder {
        let builder = thread::Builder::new().name(format!("{}-{}", self.thread_name, index));
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}


/// Behaviour shared by every pool. Object safe, so pools of different kinds
/// can sit behind `Arc<dyn ThreadPool>`.
pub trait ThreadPool: Send + Sync {
    /// Enqueues a raw job. Fails with `PoolError::Closed` once shutdown has
    /// begun; the job is then dropped without running.
    fn execute(&self, job: Job) -> Result<(), PoolError>;

    /// Tasks enqueued but not yet picked up by a worker.
    fn pending_tasks(&self) -> usize;

    fn num_threads(&self) -> usize;

    /// Stops the pool and blocks until every worker has exited. Idempotent.
    /// Called from one of the pool's own workers it only signals, since a
    /// thread cannot join itself.
    fn shutdown(&self);

    fn is_shutdown(&self) -> bool;

    /// Token cancelled when shutdown begins.
    fn shutdown_signal(&self) -> CancellationToken;

    fn metrics(&self) -> PoolMetrics;

    fn kind(&self) -> PoolKind;
}

/// Typed submission on top of [`ThreadPool::execute`].
pub trait ThreadPoolExt: ThreadPool {
    /// Runs `f` on a worker and returns a handle to its outcome. Arguments are
    /// passed by capturing them in the closure.
    fn submit<F, R>(&self, f: F) -> Result<ResultHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, handle) = package(f);
        self.execute(job)?;
        Ok(handle)
    }
}

impl<P: ThreadPool + ?Sized> ThreadPoolExt for P {}


/// Wraps `f` into a job that reports to the returned handle.
///
/// A panic is delivered to the handle and then resumed, so the worker loop
/// still sees and logs it.
pub(crate) fn package<F, R>(f: F) -> (Job, ResultHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let job: Job = Box::new(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            let _ = tx.send(Ok(value));
        }
        Err(payload) => {
            let _ = tx.send(Err(PoolError::from_panic(&*payload)));
            panic::resume_unwind(payload);
        }
    });
    (job, ResultHandle::new(rx))
}


/// Counters updated by workers.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    active: AtomicUsize,
    idle: AtomicUsize,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl PoolStats {
    #[inline]
    fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn enter_idle(&self) {
        self.idle.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn leave_idle(&self) {
        self.idle.fetch_sub(1, Ordering::Relaxed);
    }

    /// Runs one job on the calling worker. A panic is contained here and
    /// never unwinds out of the worker loop.
    fn run(&self, job: Job) {
        self.active.fetch_add(1, Ordering::Relaxed);
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let worker = thread::current();
                warn!(
                    worker = worker.name().unwrap_or("unnamed"),
                    error = %PoolError::from_panic(&*payload),
                    "task failed"
                );
            }
        }
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    fn snapshot(&self, num_threads: usize, queued_tasks: usize) -> PoolMetrics {
        PoolMetrics {
            num_threads,
            active_tasks: self.active.load(Ordering::Relaxed),
            idle_workers: self.idle.load(Ordering::Relaxed),
            queued_tasks,
            total_submitted: self.submitted.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
        }
    }
}


/// Join handles of a pool's worker threads.
pub(crate) struct Workers {
    handles: Mutex<Vec<JoinHandle<()>>>,
    ids: Vec<ThreadId>,
}

impl Workers {
    /// Starts `config.num_threads` threads, each running `body(index)`.
    ///
    /// On failure the threads already started keep running; the caller must
    /// signal them to stop.
    fn spawn<F>(config: &Config, body: F) -> Result<Self, PoolError>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let mut handles = Vec::with_capacity(config.num_threads);
        for index in 0..config.num_threads {
            let body = Arc::clone(&body);
            let handle = config
                .thread_builder(index)
                .spawn(move || body(index))
                .map_err(|e| PoolError::WorkerSpawn(e.to_string()))?;
            handles.push(handle);
        }

        debug!(threads = config.num_threads, name = %config.thread_name, "worker threads started");
        let ids = handles.iter().map(|h| h.thread().id()).collect();
        Ok(Self {
            handles: Mutex::new(handles),
            ids,
        })
    }

    fn is_worker_thread(&self) -> bool {
        self.ids.contains(&thread::current().id())
    }

    /// Joins every worker. The lock is held for the whole join so a second
    /// caller also waits for the threads to be gone.
    fn join(&self) {
        if self.is_worker_thread() {
            return;
        }
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                error!(worker = name.as_deref().unwrap_or("unnamed"), "worker thread panicked");
            }
        }
    }
}
