#[cfg(test)]
mod tests {
    use conflux::{
        collections::{AtomicHashMap, LockFreeQueue},
        handle::{join_handles, wait_all},
        model::{JoinOrdering, Priority},
        pool::{BasicThreadPool, Config, PriorityThreadPool, ThreadPool, ThreadPoolExt, WorkStealingThreadPool},
        sync::AtomicAggregateStats,
    };
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    fn busy_work(seed: u64) -> u64 {
        (0..1_000u64).fold(seed, |acc, x| acc.wrapping_mul(31).wrapping_add(x))
    }

    fn flood(pool: &dyn ThreadPool, tasks: u64) {
        let handles: Vec<_> = (0..tasks).map(|i| pool.submit(move || busy_work(i)).unwrap()).collect();
        let results = wait_all(handles);
        assert_eq!(results.len() as u64, tasks);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn load_test_1_small_tasks_every_pool() {
        println!("\n=== LOAD TEST 1: 20k small tasks per pool ===");
        let pools: Vec<Box<dyn ThreadPool>> = vec![
            Box::new(BasicThreadPool::with_config(Config::cpu_bound()).unwrap()),
            Box::new(PriorityThreadPool::with_config(Config::cpu_bound()).unwrap()),
            Box::new(WorkStealingThreadPool::with_config(Config::cpu_bound()).unwrap()),
        ];

        for pool in &pools {
            measure(&format!("{} pool, 20k tasks", pool.kind()), || flood(&**pool, 20_000));
            pool.shutdown();
            let metrics = pool.metrics();
            assert_eq!(metrics.total_submitted, 20_000);
            assert_eq!(metrics.completed_tasks, 20_000);
            assert_eq!(metrics.failed_tasks, 0);
            println!("  Success rate: {:.1}%", metrics.success_rate() * 100.0);
        }
    }

    #[test]
    fn load_test_2_blocking_tasks() {
        println!("\n=== LOAD TEST 2: 500 blocking tasks (2ms each) ===");
        let pool = BasicThreadPool::with_config(Config::io_bound()).unwrap();
        let threads = pool.num_threads() as u32;

        let elapsed = measure("500 blocking tasks", || {
            let start = Instant::now();
            let handles: Vec<_> = (0..500)
                .map(|_| pool.submit(|| thread::sleep(Duration::from_millis(2))).unwrap())
                .collect();
            wait_all(handles);
            start.elapsed()
        });

        let serial = Duration::from_millis(2) * 500;
        println!("  {} workers, serial would be {:?}", threads, serial);
        if threads > 1 {
            assert!(elapsed < serial);
        }
    }

    #[test]
    fn load_test_3_priority_under_backlog() {
        println!("\n=== LOAD TEST 3: CRITICAL latency behind a LOW backlog ===");
        let pool = PriorityThreadPool::new(2).unwrap();

        let backlog: Vec<_> = (0..2_000)
            .map(|i| {
                pool.submit_with_priority(Priority::Low, move || {
                    thread::sleep(Duration::from_micros(200));
                    i
                })
                .unwrap()
            })
            .collect();

        let start = Instant::now();
        let urgent = pool
            .submit_with_priority(Priority::Critical, move || start.elapsed())
            .unwrap();
        let waited = urgent.wait().unwrap();
        let remaining = pool.pending_tasks();
        println!("  CRITICAL started after {:?}, {} LOW still queued", waited, remaining);
        assert!(remaining > 0, "CRITICAL waited for the whole backlog");

        assert_eq!(wait_all(backlog).len(), 2_000);
    }

    #[test]
    fn load_test_4_work_stealing_skewed_submission() {
        println!("\n=== LOAD TEST 4: all work pinned to one worker ===");
        let config = Config::default()
            .with_threads(4)
            .with_idle_sleep(Duration::from_micros(200));
        let pool = WorkStealingThreadPool::with_config(config).unwrap();

        measure("5k tasks on worker 0", || {
            let handles: Vec<_> = (0..5_000u64)
                .map(|i| pool.submit_to(0, move || busy_work(i)).unwrap())
                .collect();
            assert!(wait_all(handles).iter().all(Result::is_ok));
        });

        let metrics = pool.metrics();
        println!("  Utilization: {:.1}%", metrics.utilization() * 100.0);
        assert_eq!(metrics.queued_tasks, 0);
    }

    #[tokio::test]
    async fn load_test_5_async_join() {
        println!("\n=== LOAD TEST 5: 10k tasks awaited from async code ===");
        let pool = WorkStealingThreadPool::with_config(Config::cpu_bound()).unwrap();

        let start = Instant::now();
        let handles: Vec<_> = (0..10_000u64).map(|i| pool.submit(move || i * 2).unwrap()).collect();
        let results = join_handles(handles, JoinOrdering::UnOrdered).await;
        println!("✓ 10k tasks: {:?}", start.elapsed());

        let total: u64 = results.into_iter().map(Result::unwrap).sum();
        assert_eq!(total, (0..10_000u64).map(|i| i * 2).sum::<u64>());
    }

    #[test]
    fn load_test_6_pool_feeding_shared_collections() {
        println!("\n=== LOAD TEST 6: pool tasks sharing lock-free collections ===");
        let pool = BasicThreadPool::with_config(Config::cpu_bound()).unwrap();
        let queue = Arc::new(LockFreeQueue::new());
        let index: Arc<AtomicHashMap<u64, u64, 256>> = Arc::new(AtomicHashMap::new());
        let latency = Arc::new(AtomicAggregateStats::new());

        measure("10k producer tasks", || {
            let handles: Vec<_> = (0..10_000u64)
                .map(|i| {
                    let queue = Arc::clone(&queue);
                    let index = Arc::clone(&index);
                    let latency = Arc::clone(&latency);
                    pool.submit(move || {
                        let start = Instant::now();
                        queue.enqueue(i);
                        index.insert(i, busy_work(i));
                        latency.record(start.elapsed().as_secs_f64());
                    })
                    .unwrap()
                })
                .collect();
            wait_all(handles);
        });

        let mut drained = 0;
        while queue.dequeue().is_some() {
            drained += 1;
        }
        assert_eq!(drained, 10_000);
        assert_eq!(index.len(), 10_000);
        assert_eq!(index.find(&42), Some(busy_work(42)));

        let stats = latency.snapshot();
        assert_eq!(stats.count, 10_000);
        println!("  mean task time {:?}", Duration::from_secs_f64(stats.mean.unwrap_or_default()));
    }
}
