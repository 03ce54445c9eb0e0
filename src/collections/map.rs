use crate::reclaim::{MemoryReclaimer, ReclaimGuard};
use std::{
    borrow::Borrow,
    collections::hash_map::RandomState,
    fmt,
    hash::{BuildHasher, Hash},
    sync::{
        atomic::{AtomicIsize, Ordering},
        Arc,
    },
};
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};


/// Tag bit on `Entry::next` marking the entry as logically removed.
const REMOVED: usize = 1;

struct Entry<K, V> {
    key: K,
    value: Atomic<V>,
    next: Atomic<Entry<K, V>>,
}

impl<K, V> Drop for Entry<K, V> {
    fn drop(&mut self) {
        // SAFETY: an entry is dropped either non-concurrently or after
        // reclamation, when no other thread can observe its value.
        unsafe {
            let value = self.value.load(Ordering::Relaxed, epoch::unprotected());
            if !value.is_null() {
                drop(value.into_owned());
            }
        }
    }
}


/// Hash map with `N` buckets fixed at compile time, each a CAS-managed chain.
///
/// There is no resizing; chain length is bounded only by hash spread.
/// Inserts prepend to a bucket head. Removal marks the entry first and then
/// unlinks it from its predecessor, so an entry is never resurrected by a
/// racing unlink of its neighbour. A `find` racing with an insert that has
/// not been linked yet may miss it.
///
/// Unlinked keys and values are destroyed later by whichever thread collects
/// the garbage, so both must be `Send + 'static`:
///
/// ```compile_fail
/// use conflux::AtomicHashMap;
/// use std::rc::Rc;
///
/// let map: AtomicHashMap<u32, Rc<u32>> = AtomicHashMap::new();
/// ```
pub struct AtomicHashMap<K, V, const N: usize = 64, S = RandomState> {
    buckets: Box<[Atomic<Entry<K, V>>]>,
    hasher: S,
    len: AtomicIsize,
    reclaimer: Arc<MemoryReclaimer>,
}

impl<K, V, const N: usize> AtomicHashMap<K, V, N, RandomState>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    /// # Panics
    ///
    /// Panics if `N` is zero.
    pub fn new() -> Self {
        Self::with_hasher_and_reclaimer(RandomState::new(), Arc::new(MemoryReclaimer::new()))
    }

    pub fn with_reclaimer(reclaimer: Arc<MemoryReclaimer>) -> Self {
        Self::with_hasher_and_reclaimer(RandomState::new(), reclaimer)
    }
}

impl<K, V, const N: usize> Default for AtomicHashMap<K, V, N, RandomState>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, const N: usize, S> AtomicHashMap<K, V, N, S>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
    S: BuildHasher,
{
    /// # Panics
    ///
    /// Panics if `N` is zero.
    pub fn with_hasher_and_reclaimer(hasher: S, reclaimer: Arc<MemoryReclaimer>) -> Self {
        assert!(N > 0, "AtomicHashMap needs at least one bucket");
        Self {
            buckets: (0..N).map(|_| Atomic::null()).collect(),
            hasher,
            len: AtomicIsize::new(0),
            reclaimer,
        }
    }

    /// Adds `key -> value` unless the key is already present.
    ///
    /// Returns `false` without modifying the map when the key exists. Of two
    /// racing inserts for the same key exactly one returns `true`.
    pub fn insert(&self, key: K, value: V) -> bool {
        let guard = self.reclaimer.protect();
        let bucket = self.bucket(&key);
        let mut entry = Owned::new(Entry {
            key,
            value: Atomic::new(value),
            next: Atomic::null(),
        });

        loop {
            // The duplicate scan runs from the same head the CAS expects, so
            // any insert that lands after the scan makes the CAS fail.
            let head = bucket.load(Ordering::Acquire, &guard);
            if Self::locate(head, &entry.key, &guard).is_some() {
                // `entry` is dropped here, freeing the speculative allocation.
                return false;
            }

            entry.next.store(head, Ordering::Relaxed);
            match bucket.compare_exchange(head, entry, Ordering::AcqRel, Ordering::Acquire, &guard) {
                Ok(_) => {
                    self.len.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                Err(e) => entry = e.new,
            }
        }
    }

    /// Returns a clone of the value stored for `key`.
    pub fn find<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.find_with(key, V::clone)
    }

    /// Runs `f` on the value stored for `key` without cloning it.
    pub fn find_with<Q, R>(&self, key: &Q, f: impl FnOnce(&V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.reclaimer.protect();
        let head = self.bucket(key).load(Ordering::Acquire, &guard);
        let entry = Self::locate(head, key, &guard)?;
        let value = entry.value.load(Ordering::Acquire, &guard);
        unsafe { value.as_ref() }.map(f)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.reclaimer.protect();
        let head = self.bucket(key).load(Ordering::Acquire, &guard);
        Self::locate(head, key, &guard).is_some()
    }

    /// Replaces the value for an existing key. Returns `false` if the key is
    /// absent. The previous value is retired, not dropped in place, since
    /// readers may still hold it.
    pub fn update<Q>(&self, key: &Q, value: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.reclaimer.protect();
        let head = self.bucket(key).load(Ordering::Acquire, &guard);
        let Some(entry) = Self::locate(head, key, &guard) else {
            return false;
        };

        let old = entry.value.swap(Owned::new(value), Ordering::AcqRel, &guard);
        if !old.is_null() {
            // SAFETY: the swap unlinked `old`; only this thread retires it.
            unsafe { guard.retire(old) };
        }
        true
    }

    /// Removes `key`. Returns `false` if it was not present. Of two racing
    /// removals of the same key exactly one returns `true`.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let guard = self.reclaimer.protect();
        let bucket = self.bucket(key);

        loop {
            let (prev, cur) = self.search(bucket, key, &guard);
            let Some(entry) = (unsafe { cur.as_ref() }) else {
                return false;
            };

            let next = entry.next.load(Ordering::Acquire, &guard);
            if next.tag() == REMOVED {
                continue;
            }
            if entry
                .next
                .compare_exchange(next, next.with_tag(REMOVED), Ordering::AcqRel, Ordering::Acquire, &guard)
                .is_err()
            {
                continue;
            }
            self.len.fetch_sub(1, Ordering::Relaxed);

            match prev.compare_exchange(cur, next, Ordering::AcqRel, Ordering::Acquire, &guard) {
                // SAFETY: only the thread whose CAS unlinks an entry retires it.
                Ok(_) => unsafe { guard.retire(cur) },
                // The predecessor changed. Try one rescan; if the key was
                // re-inserted ahead of this entry the scan stops early and the
                // entry stays linked until a later scan or `Drop`.
                Err(_) => {
                    self.search(bucket, key, &guard);
                }
            }
            return true;
        }
    }

    /// Visits every live entry. Entries inserted or removed during the walk
    /// may or may not be seen.
    pub fn for_each(&self, mut f: impl FnMut(&K, &V)) {
        let guard = self.reclaimer.protect();
        for bucket in self.buckets.iter() {
            let mut cur = bucket.load(Ordering::Acquire, &guard);
            while let Some(entry) = unsafe { cur.as_ref() } {
                let next = entry.next.load(Ordering::Acquire, &guard);
                if next.tag() != REMOVED {
                    let value = entry.value.load(Ordering::Acquire, &guard);
                    if let Some(value) = unsafe { value.as_ref() } {
                        f(&entry.key, value);
                    }
                }
                cur = next.with_tag(0);
            }
        }
    }

    /// Advisory entry count, clamped at zero while a removal is counted
    /// ahead of its insert.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        N
    }

    pub fn reclaimer(&self) -> &Arc<MemoryReclaimer> {
        &self.reclaimer
    }

    fn bucket<Q>(&self, key: &Q) -> &Atomic<Entry<K, V>>
    where
        Q: Hash + ?Sized,
    {
        let index = (self.hasher.hash_one(key) % N as u64) as usize;
        &self.buckets[index]
    }

    /// Read-only walk from `cur` to the first live entry holding `key`.
    fn locate<'g, Q>(mut cur: Shared<'g, Entry<K, V>>, key: &Q, guard: &'g Guard) -> Option<&'g Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        while let Some(entry) = unsafe { cur.as_ref() } {
            let next = entry.next.load(Ordering::Acquire, guard);
            if next.tag() != REMOVED && entry.key.borrow() == key {
                return Some(entry);
            }
            cur = next.with_tag(0);
        }
        None
    }

    /// Walk that unlinks every marked entry it passes. Returns the link that
    /// points at the first live entry holding `key`, together with that entry
    /// (null when absent). Restarts from the bucket head whenever an unlink
    /// loses a race.
    fn search<'g, Q>(
        &'g self,
        bucket: &'g Atomic<Entry<K, V>>,
        key: &Q,
        guard: &'g ReclaimGuard<'_>,
    ) -> (&'g Atomic<Entry<K, V>>, Shared<'g, Entry<K, V>>)
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        'restart: loop {
            let mut prev = bucket;
            let mut cur = prev.load(Ordering::Acquire, guard);

            while let Some(entry) = unsafe { cur.as_ref() } {
                let next = entry.next.load(Ordering::Acquire, guard);

                if next.tag() == REMOVED {
                    let succ = next.with_tag(0);
                    match prev.compare_exchange(cur, succ, Ordering::AcqRel, Ordering::Acquire, guard) {
                        Ok(_) => {
                            // SAFETY: the successful unlink is the only one for this entry.
                            unsafe { guard.retire(cur) };
                            cur = succ;
                            continue;
                        }
                        Err(_) => continue 'restart,
                    }
                }

                if entry.key.borrow() == key {
                    return (prev, cur);
                }
                prev = &entry.next;
                cur = next;
            }
            return (prev, Shared::null());
        }
    }
}

impl<K, V, const N: usize, S> fmt::Debug for AtomicHashMap<K, V, N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicHashMap")
            .field("buckets", &N)
            .field("len", &self.len.load(Ordering::Relaxed).max(0))
            .finish_non_exhaustive()
    }
}

impl<K, V, const N: usize, S> Drop for AtomicHashMap<K, V, N, S> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent access. Marked entries that
        // are still linked were never retired, so freeing them here is the
        // only release.
        unsafe {
            let guard = epoch::unprotected();
            for bucket in self.buckets.iter() {
                let mut cur = bucket.load(Ordering::Relaxed, guard);
                while let Some(entry) = cur.as_ref() {
                    let next = entry.next.load(Ordering::Relaxed, guard).with_tag(0);
                    drop(cur.into_owned());
                    cur = next;
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_bucket_chain_handles_middle_removal() {
        let map: AtomicHashMap<u32, &str, 1> = AtomicHashMap::new();
        assert!(map.insert(1, "one"));
        assert!(map.insert(2, "two"));
        assert!(map.insert(3, "three"));

        assert!(map.remove(&2));
        assert!(!map.remove(&2));
        assert_eq!(map.find(&1), Some("one"));
        assert_eq!(map.find(&2), None);
        assert_eq!(map.find(&3), Some("three"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn update_requires_existing_key() {
        let map: AtomicHashMap<String, u64> = AtomicHashMap::new();
        assert!(!map.update("missing", 1));
        assert!(map.insert("hits".to_string(), 1));
        assert!(map.update("hits", 2));
        assert_eq!(map.find("hits"), Some(2));
        assert_eq!(map.find_with("hits", |v| v * 10), Some(20));
    }

    #[test]
    fn for_each_skips_removed_entries() {
        let map: AtomicHashMap<u32, u32, 4> = AtomicHashMap::new();
        for k in 0..10 {
            map.insert(k, k * k);
        }
        map.remove(&3);
        let mut seen = Vec::new();
        map.for_each(|k, v| seen.push((*k, *v)));
        seen.sort_unstable();
        assert_eq!(seen.len(), 9);
        assert!(!seen.contains(&(3, 9)));
        assert_eq!(map.bucket_count(), 4);
    }
}
