// src/coordinator/registry.rs
//! Worker registry
//!
//! Maps a worker's base address to its health record. Reads (fan-out,
//! poll sweeps) take the shared lock; registration and health updates take
//! the exclusive one. The lock is never held across a network call.

use std::collections::HashMap;
use tokio::sync::RwLock;

/// Health record of one registered worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    /// Base address, e.g. `http://worker-1:8080`
    pub address: String,
    /// Consecutive failed health checks
    pub failures: u32,
    /// Set once `failures` exceeds the threshold; never cleared
    pub dead: bool,
}

impl WorkerRecord {
    fn new(address: &str) -> Self {
        WorkerRecord {
            address: address.to_string(),
            failures: 0,
            dead: false,
        }
    }
}

/// Result of applying one health check to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthUpdate {
    /// The worker answered; failures reset
    Healthy,
    /// The worker failed; it is still polled
    Failing(u32),
    /// This failure crossed the threshold
    MarkedDead,
    /// The worker is unknown or was already dead
    Ignored,
}

/// Registry of workers known to the master
#[derive(Debug)]
pub struct WorkerRegistry {
    workers: RwLock<HashMap<String, WorkerRecord>>,
    max_failures: u32,
}

impl WorkerRegistry {
    /// Creates an empty registry
    ///
    /// A worker is marked dead when its consecutive failures exceed
    /// `max_failures`.
    pub fn new(max_failures: u32) -> Self {
        WorkerRegistry {
            workers: RwLock::new(HashMap::new()),
            max_failures,
        }
    }

    /// Inserts a worker, or resets the failure count of a live one
    ///
    /// Returns true if the address was not known before. Dead workers stay
    /// dead.
    pub async fn register(&self, address: &str) -> bool {
        let mut workers = self.workers.write().await;
        match workers.get_mut(address) {
            Some(record) if record.dead => {
                log::debug!("Ignoring re-registration of dead worker {}", address);
                false
            }
            Some(record) => {
                record.failures = 0;
                false
            }
            None => {
                workers.insert(address.to_string(), WorkerRecord::new(address));
                true
            }
        }
    }

    /// Current record of `address`
    pub async fn lookup(&self, address: &str) -> Option<WorkerRecord> {
        self.workers.read().await.get(address).cloned()
    }

    /// Addresses of every worker not marked dead
    pub async fn list_healthy(&self) -> Vec<String> {
        self.collect(|r| !r.dead).await
    }

    /// Addresses of live workers with no outstanding health failures
    pub async fn list_responsive(&self) -> Vec<String> {
        self.collect(|r| !r.dead && r.failures == 0).await
    }

    /// Snapshot of every record, dead ones included
    pub async fn snapshot(&self) -> Vec<WorkerRecord> {
        let mut records: Vec<_> = self.workers.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        records
    }

    /// Applies the outcome of one health check
    pub async fn record_health(&self, address: &str, healthy: bool) -> HealthUpdate {
        let mut workers = self.workers.write().await;
        let Some(record) = workers.get_mut(address) else {
            return HealthUpdate::Ignored;
        };
        if record.dead {
            return HealthUpdate::Ignored;
        }

        if healthy {
            record.failures = 0;
            return HealthUpdate::Healthy;
        }

        record.failures += 1;
        if record.failures > self.max_failures {
            record.dead = true;
            HealthUpdate::MarkedDead
        } else {
            HealthUpdate::Failing(record.failures)
        }
    }

    /// Marks a worker dead immediately
    ///
    /// Returns false if the worker is unknown.
    pub async fn mark_dead(&self, address: &str) -> bool {
        match self.workers.write().await.get_mut(address) {
            Some(record) => {
                record.dead = true;
                true
            }
            None => false,
        }
    }

    async fn collect(&self, keep: impl Fn(&WorkerRecord) -> bool) -> Vec<String> {
        let mut addresses: Vec<_> = self
            .workers
            .read()
            .await
            .values()
            .filter(|r| keep(r))
            .map(|r| r.address.clone())
            .collect();
        addresses.sort();
        addresses
    }
}
