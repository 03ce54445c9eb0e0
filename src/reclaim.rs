//! Deferred destruction for nodes unlinked from lock-free structures.
//!
//! A thread that is about to follow shared pointers first calls
//! [`MemoryReclaimer::protect`]. While the returned guard lives, nothing it
//! can observe is freed. A node unlinked by a successful CAS is handed to
//! [`MemoryReclaimer::retire`], which destroys it only once every guard that
//! might still reference it has been dropped.
//!
//! Protection is epoch based and goes through `crossbeam::epoch`, so one
//! guard covers any number of loads instead of publishing one hazard slot per
//! pointer.

use std::{
    fmt,
    ops::Deref,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use crossbeam::epoch::{self, Guard, Owned, Shared};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimStats {
    pub retired: usize,
    pub reclaimed: usize,
}

impl ReclaimStats {
    /// Nodes retired but not destroyed yet.
    pub fn pending(&self) -> usize {
        self.retired.saturating_sub(self.reclaimed)
    }
}


/// Retire/reclaim bookkeeping shared by one or more collections.
///
/// Constructed explicitly and passed around by `Arc`; there is no process
/// wide instance.
#[derive(Default)]
pub struct MemoryReclaimer {
    retired: AtomicUsize,
    reclaimed: Arc<AtomicUsize>,
}

impl MemoryReclaimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the current thread. Pointers loaded through the guard remain
    /// valid until it is dropped.
    pub fn protect(&self) -> ReclaimGuard<'_> {
        ReclaimGuard {
            guard: epoch::pin(),
            reclaimer: self,
        }
    }

    /// Schedules `ptr` for destruction once no pinned thread can reach it.
    ///
    /// # Safety
    ///
    /// `ptr` must have been allocated as an `Owned<T>`, must already be
    /// unlinked from every shared location, and must be retired exactly once.
    /// Dropping the `T` on another thread, after the current borrow scope
    /// has ended, must be sound.
    pub unsafe fn retire<T>(&self, guard: &ReclaimGuard<'_>, ptr: Shared<'_, T>) {
        debug_assert!(!ptr.is_null(), "retiring a null pointer");
        self.retired.fetch_add(1, Ordering::Relaxed);

        let raw = ptr.as_raw() as *mut T;
        let reclaimed = Arc::clone(&self.reclaimed);
        guard.guard.defer_unchecked(move || {
            drop(Owned::from_raw(raw));
            reclaimed.fetch_add(1, Ordering::Relaxed);
        });
    }

    /// Pushes this thread's deferred destructions to the global queue and
    /// runs whatever is already safe to free.
    pub fn flush(&self) {
        epoch::pin().flush();
    }

    pub fn stats(&self) -> ReclaimStats {
        ReclaimStats {
            retired: self.retired.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for MemoryReclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("MemoryReclaimer")
            .field("retired", &stats.retired)
            .field("reclaimed", &stats.reclaimed)
            .finish()
    }
}


/// Proof that the current thread is pinned.
pub struct ReclaimGuard<'r> {
    guard: Guard,
    reclaimer: &'r MemoryReclaimer,
}

impl ReclaimGuard<'_> {
    /// Shorthand for [`MemoryReclaimer::retire`] through the guard's owner.
    ///
    /// # Safety
    ///
    /// Same contract as [`MemoryReclaimer::retire`].
    pub unsafe fn retire<T>(&self, ptr: Shared<'_, T>) {
        self.reclaimer.retire(self, ptr);
    }
}

impl Deref for ReclaimGuard<'_> {
    type Target = Guard;

    fn deref(&self) -> &Guard {
        &self.guard
    }
}
