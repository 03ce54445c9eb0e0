//! Low-level synchronization building blocks shared by client code.

pub mod bloom;
pub mod counter;
pub mod spin;

pub use bloom::ConcurrentBloomFilter;
pub use counter::{AtomicAggregateStats, AtomicCounter, StatsSnapshot};
pub use spin::{ReadGuard, ReadWriteSpinLock, SpinLock, SpinLockGuard, WriteGuard};
