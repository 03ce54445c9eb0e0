//! Thread pools and lock-free collections for sharing work and state
//! between OS threads.
//!
//! # Features
//! - FIFO, priority-ordered and work-stealing pools behind one `ThreadPool` trait
//! - Result handles that can be waited on from threads or awaited from async code
//! - Panics inside tasks are contained, logged and reported through the handle
//! - Treiber stack, Michael–Scott queue and a fixed-bucket hash map with
//!   epoch-based deferred reclamation
//! - Spin locks, atomic counters/statistics and a concurrent Bloom filter
//! - A named registry for pools shared across subsystems

pub mod collections;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod reclaim;
pub mod registry;
pub mod result;
pub mod sync;

pub use collections::{AtomicHashMap, LockFreeQueue, LockFreeStack};
pub use errors::PoolError;
pub use handle::{join_handles, wait_all, Job, ResultHandle};
pub use model::{JoinOrdering, PoolKind, PoolMetrics, Priority};
pub use pool::{BasicThreadPool, Config, PriorityThreadPool, ThreadPool, ThreadPoolExt, WorkStealingThreadPool};
pub use reclaim::{MemoryReclaimer, ReclaimGuard, ReclaimStats};
pub use registry::{PoolRegistry, RegisteredPool};
pub use result::TaskResult;
pub use sync::{AtomicAggregateStats, AtomicCounter, ConcurrentBloomFilter, ReadWriteSpinLock, SpinLock};
