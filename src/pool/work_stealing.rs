use super::{package, Config, PoolStats, ThreadPool, Workers};
use crate::{
    errors::PoolError,
    handle::{Job, ResultHandle},
    model::{PoolKind, PoolMetrics},
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};
use crossbeam::utils::CachePadded;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};


/// Deque owned by one worker. The owner takes from the front, thieves from
/// the back.
type WorkerQueue = CachePadded<Mutex<VecDeque<Job>>>;

struct Inner {
    queues: Vec<WorkerQueue>,
    shutdown: CancellationToken,
    next_queue: AtomicUsize,
    idle_sleep: Duration,
    stats: PoolStats,
}

impl Inner {
    fn lock(&self, index: usize) -> MutexGuard<'_, VecDeque<Job>> {
        self.queues[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, index: usize, job: Job) -> Result<(), PoolError> {
        {
            let mut queue = self.lock(index);
            // Checked under the queue lock so `drain_all` cannot miss a job.
            if self.shutdown.is_cancelled() {
                return Err(PoolError::Closed);
            }
            queue.push_back(job);
        }
        self.stats.record_submit();
        Ok(())
    }

    fn pop_local(&self, index: usize) -> Option<Job> {
        self.lock(index).pop_front()
    }

    /// Scans the other queues starting at the right-hand neighbour and takes
    /// the back task of the first one holding more than one. A victim's last
    /// task is left to its owner.
    fn steal(&self, thief: usize) -> Option<Job> {
        let n = self.queues.len();
        for offset in 1..n {
            let victim = (thief + offset) % n;
            let mut queue = self.lock(victim);
            if queue.len() > 1 {
                trace!(thief, victim, remaining = queue.len() - 1, "stole task");
                return queue.pop_back();
            }
        }
        None
    }

    /// Worker body. The shutdown flag is checked before every dequeue, so
    /// queued tasks are not drained once shutdown begins.
    fn worker_loop(&self, index: usize) {
        while !self.shutdown.is_cancelled() {
            let job = self.pop_local(index).or_else(|| self.steal(index));
            match job {
                Some(job) => self.stats.run(job),
                None => {
                    self.stats.enter_idle();
                    thread::sleep(self.idle_sleep);
                    self.stats.leave_idle();
                }
            }
        }
    }

    fn pending(&self) -> usize {
        (0..self.queues.len()).map(|i| self.lock(i).len()).sum()
    }

    /// Drops every queued job. Their handles resolve to `PoolError::Abandoned`.
    fn drain_all(&self) -> usize {
        (0..self.queues.len())
            .map(|i| {
                let abandoned: Vec<Job> = self.lock(i).drain(..).collect();
                abandoned.len()
            })
            .sum()
    }
}


/// One private deque per worker, with idle workers stealing from busy ones.
///
/// New tasks go round-robin across the deques regardless of load; stealing
/// evens things out afterwards. Idle workers sleep `Config::idle_sleep`
/// between polls rather than blocking.
///
/// Unlike the basic and priority pools, `shutdown` does not drain: tasks
/// still queued when it is called never run and their handles resolve to
/// `PoolError::Abandoned`.
pub struct WorkStealingThreadPool {
    inner: Arc<Inner>,
    workers: Workers,
    config: Config,
}

impl WorkStealingThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;
        let inner = Arc::new(Inner {
            queues: (0..config.num_threads)
                .map(|_| CachePadded::new(Mutex::new(VecDeque::new())))
                .collect(),
            shutdown: CancellationToken::new(),
            next_queue: AtomicUsize::new(0),
            idle_sleep: config.idle_sleep,
            stats: PoolStats::default(),
        });

        let worker_inner = Arc::clone(&inner);
        let workers = Workers::spawn(&config, move |index| worker_inner.worker_loop(index)).map_err(|e| {
            inner.shutdown.cancel();
            e
        })?;

        Ok(Self { inner, workers, config })
    }

    /// Queues `f` on a specific worker's deque. Other workers may still
    /// steal it.
    pub fn submit_to<F, R>(&self, worker: usize, f: F) -> Result<ResultHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if worker >= self.inner.queues.len() {
            return Err(PoolError::InvalidWorker {
                index: worker,
                num_threads: self.inner.queues.len(),
            });
        }
        let (job, handle) = package(f);
        self.inner.push(worker, job)?;
        Ok(handle)
    }

    /// Tasks waiting in one worker's deque.
    pub fn queue_len(&self, worker: usize) -> Option<usize> {
        (worker < self.inner.queues.len()).then(|| self.inner.lock(worker).len())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ThreadPool for WorkStealingThreadPool {
    fn execute(&self, job: Job) -> Result<(), PoolError> {
        let index = self.inner.next_queue.fetch_add(1, Ordering::Relaxed) % self.inner.queues.len();
        self.inner.push(index, job)
    }

    fn pending_tasks(&self) -> usize {
        self.inner.pending()
    }

    fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.workers.join();

        let abandoned = self.inner.drain_all();
        if abandoned > 0 {
            debug!(abandoned, "work-stealing pool stopped with queued tasks");
        }
    }

    fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn shutdown_signal(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    fn metrics(&self) -> PoolMetrics {
        self.inner.stats.snapshot(self.config.num_threads, self.pending_tasks())
    }

    fn kind(&self) -> PoolKind {
        PoolKind::WorkStealing
    }
}

impl Drop for WorkStealingThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
