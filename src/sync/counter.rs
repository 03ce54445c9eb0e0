use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use crossbeam::utils::CachePadded;


/// Signed counter with separately tracked increment and decrement totals.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: CachePadded<AtomicI64>,
    increments: AtomicU64,
    decrements: AtomicU64,
}

impl AtomicCounter {
    pub fn new(initial: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial)),
            increments: AtomicU64::new(0),
            decrements: AtomicU64::new(0),
        }
    }

    /// Adds one and returns the new value.
    #[inline]
    pub fn increment(&self) -> i64 {
        self.add(1)
    }

    /// Subtracts one and returns the new value.
    #[inline]
    pub fn decrement(&self) -> i64 {
        self.sub(1)
    }

    pub fn add(&self, delta: i64) -> i64 {
        self.increments.fetch_add(1, Ordering::Relaxed);
        self.value.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    pub fn sub(&self, delta: i64) -> i64 {
        self.decrements.fetch_add(1, Ordering::Relaxed);
        self.value.fetch_sub(delta, Ordering::AcqRel).wrapping_sub(delta)
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn total_increments(&self) -> u64 {
        self.increments.load(Ordering::Relaxed)
    }

    pub fn total_decrements(&self) -> u64 {
        self.decrements.load(Ordering::Relaxed)
    }

    /// Sets the value to zero and clears the totals. Returns the old value.
    pub fn reset(&self) -> i64 {
        self.increments.store(0, Ordering::Relaxed);
        self.decrements.store(0, Ordering::Relaxed);
        self.value.swap(0, Ordering::AcqRel)
    }
}


/// Point-in-time view of `AtomicAggregateStats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Running count/sum/min/max over `f64` samples.
///
/// There is no native atomic add/min/max for floats, so sum, min and max are
/// kept as bit patterns in `AtomicU64` and updated through compare-and-swap
/// retry loops. Under heavy contention each update may retry once per
/// competing thread.
#[derive(Debug)]
pub struct AtomicAggregateStats {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for AtomicAggregateStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicAggregateStats {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0f64.to_bits()),
            min: AtomicU64::new(f64::INFINITY.to_bits()),
            max: AtomicU64::new(f64::NEG_INFINITY.to_bits()),
        }
    }

    /// Folds one sample in. NaN samples are ignored and return `false`.
    pub fn record(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        update_f64(&self.sum, |sum| Some(sum + value));
        update_f64(&self.min, |min| (value < min).then_some(value));
        update_f64(&self.max, |max| (value > max).then_some(value));
        // Counted last so a reader that sees the count also sees a populated min/max.
        self.count.fetch_add(1, Ordering::Release);
        true
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum.load(Ordering::Acquire))
    }

    pub fn min(&self) -> Option<f64> {
        if self.count() == 0 {
            return None;
        }
        Some(f64::from_bits(self.min.load(Ordering::Acquire)))
    }

    pub fn max(&self) -> Option<f64> {
        if self.count() == 0 {
            return None;
        }
        Some(f64::from_bits(self.max.load(Ordering::Acquire)))
    }

    pub fn mean(&self) -> Option<f64> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        Some(self.sum() / count as f64)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let count = self.count();
        let sum = self.sum();
        StatsSnapshot {
            count,
            sum,
            min: self.min(),
            max: self.max(),
            mean: (count > 0).then(|| sum / count as f64),
        }
    }

    /// Not atomic with respect to concurrent `record` calls.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
        self.sum.store(0f64.to_bits(), Ordering::Release);
        self.min.store(f64::INFINITY.to_bits(), Ordering::Release);
        self.max.store(f64::NEG_INFINITY.to_bits(), Ordering::Release);
    }
}

/// CAS loop over an `f64` stored as bits. `f` returns `None` to leave the
/// current value untouched.
fn update_f64(cell: &AtomicU64, f: impl Fn(f64) -> Option<f64>) {
    let mut current = cell.load(Ordering::Acquire);
    loop {
        let Some(next) = f(f64::from_bits(current)) else {
            return;
        };
        match cell.compare_exchange_weak(current, next.to_bits(), Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_tracks_totals() {
        let counter = AtomicCounter::new(10);
        assert_eq!(counter.increment(), 11);
        assert_eq!(counter.decrement(), 10);
        assert_eq!(counter.add(5), 15);
        assert_eq!(counter.sub(20), -5);
        assert_eq!(counter.total_increments(), 2);
        assert_eq!(counter.total_decrements(), 2);
        assert_eq!(counter.reset(), -5);
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.total_increments(), 0);
    }

    #[test]
    fn stats_on_empty_and_filled() {
        let stats = AtomicAggregateStats::new();
        assert_eq!(stats.min(), None);
        assert_eq!(stats.mean(), None);

        for v in [3.0, -1.5, 8.0, 2.5] {
            assert!(stats.record(v));
        }
        assert!(!stats.record(f64::NAN));

        let snap = stats.snapshot();
        assert_eq!(snap.count, 4);
        assert_eq!(snap.sum, 12.0);
        assert_eq!(snap.min, Some(-1.5));
        assert_eq!(snap.max, Some(8.0));
        assert_eq!(snap.mean, Some(3.0));

        stats.reset();
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.sum(), 0.0);
        assert_eq!(stats.max(), None);
    }
}
