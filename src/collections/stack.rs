use crate::reclaim::MemoryReclaimer;
use std::{
    fmt,
    mem::ManuallyDrop,
    ptr,
    sync::{
        atomic::{AtomicIsize, Ordering},
        Arc,
    },
};
use crossbeam::epoch::{self, Atomic, Owned};


struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}


/// LIFO stack over an atomic head pointer (Treiber stack).
pub struct LockFreeStack<T> {
    head: Atomic<Node<T>>,
    len: AtomicIsize,
    reclaimer: Arc<MemoryReclaimer>,
}

unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

impl<T> LockFreeStack<T> {
    pub fn new() -> Self {
        Self::with_reclaimer(Arc::new(MemoryReclaimer::new()))
    }

    pub fn with_reclaimer(reclaimer: Arc<MemoryReclaimer>) -> Self {
        Self {
            head: Atomic::null(),
            len: AtomicIsize::new(0),
            reclaimer,
        }
    }

    pub fn push(&self, value: T) {
        let mut node = Owned::new(Node {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        });
        let guard = self.reclaimer.protect();

        loop {
            let head = self.head.load(Ordering::Relaxed, &guard);
            node.next.store(head, Ordering::Relaxed);

            match self.head.compare_exchange(head, node, Ordering::Release, Ordering::Relaxed, &guard) {
                Ok(_) => break,
                Err(e) => node = e.new,
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes the most recently pushed value, or `None` on an empty stack.
    pub fn pop(&self) -> Option<T> {
        let guard = self.reclaimer.protect();

        loop {
            let head = self.head.load(Ordering::Acquire, &guard);
            let node = unsafe { head.as_ref() }?;
            let next = node.next.load(Ordering::Relaxed, &guard);

            if self
                .head
                .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_ok()
            {
                self.len.fetch_sub(1, Ordering::Relaxed);
                // SAFETY: the CAS made this thread the only one to unlink the
                // node, so the value is moved out exactly once. The node shell
                // stays readable for other pinned threads until reclaimed.
                unsafe {
                    let value = ManuallyDrop::into_inner(ptr::read(&node.value));
                    guard.retire(head);
                    return Some(value);
                }
            }
        }
    }

    /// Copies the top value without removing it.
    ///
    /// Limited to `Copy` values: a racing `pop` moves the value out of the
    /// node, so no reference into the node may outlive this call.
    pub fn peek(&self) -> Option<T>
    where
        T: Copy,
    {
        let guard = self.reclaimer.protect();
        let head = self.head.load(Ordering::Acquire, &guard);
        // SAFETY: the node stays allocated while pinned, and a bitwise copy
        // of a `Copy` value owns nothing the popper could free.
        unsafe { head.as_ref() }.map(|node| unsafe { ptr::read(&*node.value) })
    }

    pub fn is_empty(&self) -> bool {
        let guard = self.reclaimer.protect();
        self.head.load(Ordering::Acquire, &guard).is_null()
    }

    /// Advisory element count. A pop may be counted before the push it
    /// removed, so the raw counter can dip below zero; it is clamped here.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn reclaimer(&self) -> &Arc<MemoryReclaimer> {
        &self.reclaimer
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for LockFreeStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeStack")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent access.
        unsafe {
            let guard = epoch::unprotected();
            let mut cur = self.head.load(Ordering::Relaxed, guard);
            while let Some(node) = cur.as_ref() {
                let next = node.next.load(Ordering::Relaxed, guard);
                let mut owned = cur.into_owned();
                ManuallyDrop::drop(&mut owned.value);
                cur = next;
            }
        }
    }
}
