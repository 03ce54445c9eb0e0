use conflux::{
    BasicThreadPool, Config, PriorityThreadPool, ThreadPool, ThreadPoolExt, WorkStealingThreadPool,
};
use std::{sync::Arc, time::Instant};
use tracing_subscriber::EnvFilter;


fn drive(label: &str, pool: Arc<dyn ThreadPool>, tasks: usize) {
    let now = Instant::now();
    let handles: Vec<_> = (0..tasks)
        .filter_map(|i| pool.submit(move || i.wrapping_mul(31)).ok())
        .collect();
    let checksum = handles
        .into_iter()
        .filter_map(|h| h.wait().ok())
        .fold(0usize, usize::wrapping_add);
    pool.shutdown();
    println!("{label:>14}: {tasks} tasks in {:?} (checksum {checksum})", now.elapsed());
}

fn main() -> Result<(), conflux::PoolError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    const TASKS: usize = 200_000;
    let config = Config::cpu_bound();

    drive("basic", Arc::new(BasicThreadPool::with_config(config.clone())?), TASKS);
    drive("priority", Arc::new(PriorityThreadPool::with_config(config.clone())?), TASKS);
    drive("work-stealing", Arc::new(WorkStealingThreadPool::with_config(config)?), TASKS);
    Ok(())
}
