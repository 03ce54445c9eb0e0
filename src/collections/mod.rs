//! Collections mutated purely through compare-and-swap.
//!
//! Each structure owns an `Arc<MemoryReclaimer>`; unlinked nodes are retired
//! through it and freed once no pinned thread can still reach them. `len()`
//! on every collection is advisory: it is kept by a separate counter and may
//! lag the structure while operations are in flight.

pub mod map;
pub mod queue;
pub mod stack;

pub use map::AtomicHashMap;
pub use queue::LockFreeQueue;
pub use stack::LockFreeStack;
