//! Named pools shared between subsystems.

use super::{
    errors::PoolError,
    model::PoolKind,
    pool::{BasicThreadPool, Config, PriorityThreadPool, ThreadPool, WorkStealingThreadPool},
};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::debug;


/// A pool held by the registry, with its concrete kind preserved.
#[derive(Clone)]
pub enum RegisteredPool {
    Basic(Arc<BasicThreadPool>),
    Priority(Arc<PriorityThreadPool>),
    WorkStealing(Arc<WorkStealingThreadPool>),
}

impl RegisteredPool {
    fn build(kind: PoolKind, config: Config) -> Result<Self, PoolError> {
        Ok(match kind {
            PoolKind::Basic => RegisteredPool::Basic(Arc::new(BasicThreadPool::with_config(config)?)),
            PoolKind::Priority => RegisteredPool::Priority(Arc::new(PriorityThreadPool::with_config(config)?)),
            PoolKind::WorkStealing => {
                RegisteredPool::WorkStealing(Arc::new(WorkStealingThreadPool::with_config(config)?))
            }
        })
    }

    pub fn kind(&self) -> PoolKind {
        self.as_pool().kind()
    }

    pub fn as_pool(&self) -> &dyn ThreadPool {
        match self {
            RegisteredPool::Basic(pool) => pool.as_ref() as &dyn ThreadPool,
            RegisteredPool::Priority(pool) => pool.as_ref() as &dyn ThreadPool,
            RegisteredPool::WorkStealing(pool) => pool.as_ref() as &dyn ThreadPool,
        }
    }

    pub fn into_pool(self) -> Arc<dyn ThreadPool> {
        match self {
            RegisteredPool::Basic(pool) => pool as Arc<dyn ThreadPool>,
            RegisteredPool::Priority(pool) => pool as Arc<dyn ThreadPool>,
            RegisteredPool::WorkStealing(pool) => pool as Arc<dyn ThreadPool>,
        }
    }

    pub fn as_basic(&self) -> Option<&Arc<BasicThreadPool>> {
        match self {
            RegisteredPool::Basic(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_priority(&self) -> Option<&Arc<PriorityThreadPool>> {
        match self {
            RegisteredPool::Priority(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_work_stealing(&self) -> Option<&Arc<WorkStealingThreadPool>> {
        match self {
            RegisteredPool::WorkStealing(pool) => Some(pool),
            _ => None,
        }
    }
}


/// Owns pools by name. Each name is built on first request and the same
/// instance is returned afterwards.
///
/// Construct one at the application root and hand it to consumers; separate
/// registries are fully independent.
#[derive(Default)]
pub struct PoolRegistry {
    pools: RwLock<HashMap<String, RegisteredPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pool registered as `name`, building it from `kind` and
    /// `config` if absent. When the name already exists, `kind` and `config`
    /// are ignored.
    pub fn get_or_create(&self, name: &str, kind: PoolKind, config: Config) -> Result<RegisteredPool, PoolError> {
        if let Some(pool) = self.get(name) {
            return Ok(pool);
        }

        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pools.get(name) {
            return Ok(pool.clone());
        }

        let config = if config.thread_name == Config::default().thread_name {
            config.with_thread_name(name)
        } else {
            config
        };
        let pool = RegisteredPool::build(kind, config)?;
        debug!(name, %kind, "registered pool");
        pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    pub fn get(&self, name: &str) -> Option<RegisteredPool> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Unregisters `name` and shuts the pool down.
    pub fn remove(&self, name: &str) -> Option<RegisteredPool> {
        let pool = self
            .pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)?;
        pool.as_pool().shutdown();
        debug!(name, "removed pool");
        Some(pool)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.pools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregisters and shuts down every pool.
    pub fn shutdown_all(&self) {
        let pools: Vec<(String, RegisteredPool)> = self
            .pools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (name, pool) in pools {
            pool.as_pool().shutdown();
            debug!(name = %name, "pool shut down");
        }
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
