use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Bounded admission for pipeline requests. A request either gets a permit
/// immediately or is turned away; nothing queues.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    total: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolMetrics {
    pub capacity: usize,
    pub available_permits: usize,
    pub total_requests: u64,
    pub rejected_requests: u64,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        info!(max_concurrent_requests = capacity, "Initializing worker pool");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            total: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The slot is held until the returned permit is dropped.
    pub fn try_admit(&self) -> AppResult<OwnedSemaphorePermit> {
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                debug!(
                    total_requests = total,
                    available_permits = self.semaphore.available_permits(),
                    "Worker permit acquired"
                );
                Ok(permit)
            }
            Err(_) => {
                let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    total_requests = total,
                    rejected_requests = rejected,
                    capacity = self.capacity,
                    "Worker pool full, rejecting request"
                );
                Err(AppError::RateLimitExceeded)
            }
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            capacity: self.capacity,
            available_permits: self.semaphore.available_permits(),
            total_requests: self.total.load(Ordering::Relaxed),
            rejected_requests: self.rejected.load(Ordering::Relaxed),
        }
    }
}
