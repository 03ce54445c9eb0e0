use std::fmt;

/// Snapshot of a pool's counters. Values are read independently and may be
/// momentarily inconsistent with each other while the pool is busy.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    pub num_threads: usize,
    pub active_tasks: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub total_submitted: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.num_threads == 0 {
            return 0.0;
        }
        self.active_tasks as f64 / self.num_threads as f64
    }

    pub fn queue_pressure(&self) -> f64 {
        if self.num_threads == 0 {
            return self.queued_tasks as f64;
        }
        self.queued_tasks as f64 / self.num_threads as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}

/// Scheduling band for `PriorityThreadPool`. Higher variants run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

/// Which pool implementation a registry entry should be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Basic,
    Priority,
    WorkStealing,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolKind::Basic => "basic",
            PoolKind::Priority => "priority",
            PoolKind::WorkStealing => "work-stealing",
        };
        f.write_str(name)
    }
}

/// Order in which `join_handles` yields results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOrdering {
    /// Results line up with the input handles.
    Ordered,
    /// Results arrive in completion order.
    UnOrdered,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_bands_are_ordered() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn metrics_ratios_handle_empty_pools() {
        let metrics = PoolMetrics::default();
        assert_eq!(metrics.utilization(), 0.0);
        assert_eq!(metrics.success_rate(), 1.0);

        let busy = PoolMetrics {
            num_threads: 4,
            active_tasks: 2,
            completed_tasks: 3,
            failed_tasks: 1,
            ..Default::default()
        };
        assert_eq!(busy.utilization(), 0.5);
        assert_eq!(busy.success_rate(), 0.75);
    }
}
