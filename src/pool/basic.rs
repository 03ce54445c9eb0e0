use super::{
    shared::{JobQueue, SharedQueue},
    Config, ThreadPool, Workers,
};
use crate::{
    errors::PoolError,
    handle::Job,
    model::{PoolKind, PoolMetrics},
};
use std::{collections::VecDeque, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::debug;


impl JobQueue for VecDeque<Job> {
    type Item = Job;

    fn push(&mut self, item: Job) {
        self.push_back(item);
    }

    fn pop(&mut self) -> Option<Job> {
        self.pop_front()
    }

    fn len(&self) -> usize {
        VecDeque::len(self)
    }
}


/// Fixed set of workers draining one shared FIFO queue.
///
/// Tasks already queued when `shutdown` is called still run before the
/// workers exit.
pub struct BasicThreadPool {
    shared: Arc<SharedQueue<VecDeque<Job>>>,
    workers: Workers,
    config: Config,
}

impl BasicThreadPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;
        let shared = Arc::new(SharedQueue::new(VecDeque::new()));

        let worker_shared = Arc::clone(&shared);
        let workers = Workers::spawn(&config, move |_| worker_shared.worker_loop()).map_err(|e| {
            shared.close();
            e
        })?;

        Ok(Self { shared, workers, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ThreadPool for BasicThreadPool {
    fn execute(&self, job: Job) -> Result<(), PoolError> {
        self.shared.push(job)
    }

    fn pending_tasks(&self) -> usize {
        self.shared.len()
    }

    fn num_threads(&self) -> usize {
        self.config.num_threads
    }

    fn shutdown(&self) {
        if !self.shared.is_closed() {
            debug!(pending = self.pending_tasks(), "basic pool shutting down");
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
        PoolKind::Basic
    }
}

impl Drop for BasicThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
