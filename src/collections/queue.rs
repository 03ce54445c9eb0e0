use crate::reclaim::MemoryReclaimer;
use std::{
    fmt,
    mem::MaybeUninit,
    sync::{
        atomic::{AtomicIsize, Ordering},
        Arc,
    },
};
use crossbeam::{
    epoch::{self, Atomic, Owned, Shared},
    utils::CachePadded,
};


struct Node<T> {
    /// Uninitialized in the dummy node at `head`.
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}


/// FIFO queue after Michael and Scott.
///
/// `head` always points at a dummy node whose value has already been taken;
/// the first live value sits in `head.next`. `tail` may lag one node behind
/// the real end, and every operation that notices the lag helps swing it
/// forward before retrying.
pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    len: AtomicIsize,
    reclaimer: Arc<MemoryReclaimer>,
}

unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    pub fn new() -> Self {
        Self::with_reclaimer(Arc::new(MemoryReclaimer::new()))
    }

    pub fn with_reclaimer(reclaimer: Arc<MemoryReclaimer>) -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            len: AtomicIsize::new(0),
            reclaimer,
        };
        let dummy = Owned::new(Node {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        });
        // SAFETY: the queue is not shared yet.
        unsafe {
            let dummy = dummy.into_shared(epoch::unprotected());
            queue.head.store(dummy, Ordering::Relaxed);
            queue.tail.store(dummy, Ordering::Relaxed);
        }
        queue
    }

    pub fn enqueue(&self, value: T) {
        let guard = self.reclaimer.protect();
        let new = Owned::new(Node {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(&guard);

        loop {
            let tail = self.tail.load(Ordering::Acquire, &guard);
            // SAFETY: `tail` is never null and cannot be reclaimed while pinned.
            let tail_node = unsafe { tail.deref() };
            let next = tail_node.next.load(Ordering::Acquire, &guard);

            if !next.is_null() {
                let _ = self.tail.compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, &guard);
                continue;
            }

            if tail_node
                .next
                .compare_exchange(Shared::null(), new, Ordering::Release, Ordering::Relaxed, &guard)
                .is_ok()
            {
                let _ = self.tail.compare_exchange(tail, new, Ordering::Release, Ordering::Relaxed, &guard);
                break;
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes the oldest value, or `None` when the queue is empty.
    pub fn dequeue(&self) -> Option<T> {
        let guard = self.reclaimer.protect();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            // SAFETY: `head` is never null and cannot be reclaimed while pinned.
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, &guard);
            let next_node = unsafe { next.as_ref() }?;

            // `tail` must move past the dummy before the dummy is retired.
            let tail = self.tail.load(Ordering::Acquire, &guard);
            if tail == head {
                let _ = self.tail.compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, &guard);
                continue;
            }

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: winning the CAS grants sole ownership of the value in
                // `next`, which becomes the new dummy. The old dummy is
                // unreachable from the queue and is retired exactly once.
                unsafe {
                    let value = next_node.value.assume_init_read();
                    guard.retire(head);
                    return Some(value);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.reclaimer.protect();
        let head = self.head.load(Ordering::Acquire, &guard);
        unsafe { head.deref() }.next.load(Ordering::Acquire, &guard).is_null()
    }

    /// Advisory element count, clamped at zero while a dequeue is counted
    /// ahead of its enqueue.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn reclaimer(&self) -> &Arc<MemoryReclaimer> {
        &self.reclaimer
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent access. Only nodes after
        // the dummy hold initialized values.
        unsafe {
            let guard = epoch::unprotected();
            let dummy = self.head.load(Ordering::Relaxed, guard);
            let mut cur = dummy.deref().next.load(Ordering::Relaxed, guard);
            drop(dummy.into_owned());

            while let Some(node) = cur.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                let mut owned = cur.into_owned();
                owned.value.assume_init_drop();
                cur = next;
            }
        }
    }
}
