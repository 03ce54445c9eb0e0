use crate::errors::PoolError;
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicBool, Ordering},
};


/// Approximate set membership over a fixed array of atomic bits.
///
/// Bits are only ever set by `insert` and only cleared all at once by
/// `clear`, so an inserted item is never reported absent. False positives
/// grow with the fill ratio.
#[derive(Debug)]
pub struct ConcurrentBloomFilter {
    bits: Vec<AtomicBool>,
    hash_count: usize,
}

impl ConcurrentBloomFilter {
    /// Creates a filter with `size` bits probed by `hash_count` hashes per item.
    pub fn new(size: usize, hash_count: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidConfig("bloom filter size must be non-zero".into()));
        }
        if hash_count == 0 {
            return Err(PoolError::InvalidConfig("bloom filter needs at least one hash".into()));
        }
        Ok(Self {
            bits: (0..size).map(|_| AtomicBool::new(false)).collect(),
            hash_count,
        })
    }

    pub fn insert<T: Hash + ?Sized>(&self, item: &T) {
        for i in 0..self.hash_count {
            self.bits[self.bit_index(item, i)].store(true, Ordering::Relaxed);
        }
    }

    pub fn might_contain<T: Hash + ?Sized>(&self, item: &T) -> bool {
        (0..self.hash_count).all(|i| self.bits[self.bit_index(item, i)].load(Ordering::Relaxed))
    }

    pub fn clear(&self) {
        for bit in &self.bits {
            bit.store(false, Ordering::Relaxed);
        }
    }

    pub fn size(&self) -> usize {
        self.bits.len()
    }

    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    pub fn set_bits(&self) -> usize {
        self.bits.iter().filter(|b| b.load(Ordering::Relaxed)).count()
    }

    pub fn fill_ratio(&self) -> f64 {
        self.set_bits() as f64 / self.bits.len() as f64
    }

    /// Chance that a never-inserted item is reported present, given the
    /// current fill ratio.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        self.fill_ratio().powi(self.hash_count as i32)
    }

    /// Hash `salt` of `item`: the item and the salt go through one
    /// deterministic SipHash.
    fn bit_index<T: Hash + ?Sized>(&self, item: &T, salt: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        item.hash(&mut hasher);
        salt.hash(&mut hasher);
        (hasher.finish() % self.bits.len() as u64) as usize
    }
}
