//! Busy-waiting locks for very short critical sections.
//!
//! Neither lock is fair: under contention any waiter may starve. A stream
//! of readers can keep a `ReadWriteSpinLock` writer waiting indefinitely.

use std::{
    cell::UnsafeCell,
    fmt,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use crossbeam::utils::Backoff;


/// Mutual exclusion over an atomic flag.
pub struct SpinLock<T: ?Sized> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Spins until the flag is acquired. Backs off to `yield_now` once
    /// plain spinning stops paying off.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        while self.locked.swap(true, Ordering::Acquire) {
            // Wait on a plain load so waiters don't bounce the cache line.
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
        SpinLockGuard { lock: self }
    }

    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.locked.swap(true, Ordering::Acquire) {
            None
        } else {
            Some(SpinLockGuard { lock: self })
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

/// Releases the `SpinLock` when dropped.
pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the flag.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive ownership of the flag.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}


/// Reader/writer spin lock built from a writer flag and a reader count.
///
/// Readers register optimistically and withdraw if a writer showed up while
/// they were registering. A writer claims the flag first and then waits for
/// the registered readers to drain.
pub struct ReadWriteSpinLock<T: ?Sized> {
    writer: AtomicBool,
    readers: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for ReadWriteSpinLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for ReadWriteSpinLock<T> {}

impl<T> ReadWriteSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            writer: AtomicBool::new(false),
            readers: AtomicUsize::new(0),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> ReadWriteSpinLock<T> {
    pub fn read(&self) -> ReadGuard<'_, T> {
        let backoff = Backoff::new();
        loop {
            if let Some(guard) = self.try_read() {
                return guard;
            }
            backoff.snooze();
        }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        if self.writer.load(Ordering::SeqCst) {
            return None;
        }
        self.readers.fetch_add(1, Ordering::SeqCst);
        // A writer may have claimed the flag between the check and the increment.
        if self.writer.load(Ordering::SeqCst) {
            self.readers.fetch_sub(1, Ordering::Release);
            return None;
        }
        Some(ReadGuard { lock: self })
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        let backoff = Backoff::new();
        while self
            .writer
            .compare_exchange_weak(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }

        backoff.reset();
        while self.readers.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }
        WriteGuard { lock: self }
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        if self
            .writer
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        if self.readers.load(Ordering::SeqCst) != 0 {
            self.writer.store(false, Ordering::Release);
            return None;
        }
        Some(WriteGuard { lock: self })
    }

    pub fn reader_count(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    pub fn is_write_locked(&self) -> bool {
        self.writer.load(Ordering::Relaxed)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for ReadWriteSpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for ReadWriteSpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadWriteSpinLock")
            .field("readers", &self.reader_count())
            .field("writer", &self.is_write_locked())
            .finish_non_exhaustive()
    }
}

pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteSpinLock<T>,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: no writer can hold the lock while a reader is registered.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.readers.fetch_sub(1, Ordering::Release);
    }
}

pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a ReadWriteSpinLock<T>,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the writer flag is held and all readers have drained.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the writer flag is held and all readers have drained.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.writer.store(false, Ordering::Release);
    }
}
