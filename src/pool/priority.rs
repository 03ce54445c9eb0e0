use super::{
    package,
    shared::{JobQueue, SharedQueue},
    Config, ThreadPool, Workers,
};
use crate::{
    errors::PoolError,
    handle::{Job, ResultHandle},
    model::{PoolKind, PoolMetrics, Priority},
};
use std::{
    cmp::Ordering as CmpOrdering,
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};


/// Heap entry. Higher priority first; within a band, lower sequence first.
pub(crate) struct PrioritizedJob {
    priority: Priority,
    sequence: u64,
    job: Job,
}

impl PartialEq for PrioritizedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for PrioritizedJob {}

impl PartialOrd for PrioritizedJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioritizedJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl JobQueue for BinaryHeap<PrioritizedJob> {
    type Item = PrioritizedJob;

    fn push(&mut self, item: PrioritizedJob) {
        BinaryHeap::push(self, item);
    }

    fn pop(&mut self) -> Option<Job> {
        BinaryHeap::pop(self).map(|entry| {
            trace!(task = entry.sequence, priority = ?entry.priority, "dispatching");
            entry.job
        })
    }

    fn len(&self) -> usize {
        BinaryHeap::len(self)
    }
}


/// Workers draining one shared heap ordered by priority, first come first
/// served within a priority.
///
/// Lower priorities are not protected from starvation: while higher-priority
/// work keeps arriving they may never run. Shutdown drains like
/// `BasicThreadPool`.
pub struct PriorityThreadPool {
    shared: Arc<SharedQueue<BinaryHeap<PrioritizedJob>>>,
    workers: Workers,
    sequence: AtomicU64,
    config: Config,
}

impl PriorityThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;
        let shared = Arc::new(SharedQueue::new(BinaryHeap::new()));

        let worker_shared = Arc::clone(&shared);
        let workers = Workers::spawn(&config, move |_| worker_shared.worker_loop()).map_err(|e| {
            shared.close();
            e
        })?;

        Ok(Self {
            shared,
            workers,
            sequence: AtomicU64::new(0),
            config,
        })
    }

    pub fn submit_with_priority<F, R>(&self, priority: Priority, f: F) -> Result<ResultHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, handle) = package(f);
        self.execute_with_priority(priority, job)?;
        Ok(handle)
    }

    pub fn execute_with_priority(&self, priority: Priority, job: Job) -> Result<(), PoolError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.shared.push(PrioritizedJob { priority, sequence, job })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ThreadPool for PriorityThreadPool {
    /// Enqueues at `Priority::Normal`.
    fn execute(&self, job: Job) -> Result<(), PoolError> {
        self.execute_with_priority(Priority::Normal, job)
    }

    fn pending_tasks(&self) -> usize {
        self.shared.len()
    }

    fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    fn shutdown(&self) {
        if !self.shared.is_closed() {
            debug!(pending = self.pending_tasks(), "priority pool shutting down");
        }
        self.shared.close();
        self.workers.join();
    }

    fn is_shutdown(&self) -> bool {
        self.shared.is_closed()
    }

    fn shutdown_signal(&self) -> CancellationToken {
        self.shared.shutdown_signal()
    }

    fn metrics(&self) -> PoolMetrics {
        self.shared.stats.snapshot(self.config.num_threads, self.pending_tasks())
    }

    fn kind(&self) -> PoolKind {
        PoolKind::Priority
    }
}

impl Drop for PriorityThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
