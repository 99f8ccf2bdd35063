//! Bounded worker pool for fire-and-forget jobs
//!
//! Node actions that talk to the outside world (sending chat, forwarding to
//! the host) run here instead of on the walk's thread. There is no queue: a
//! submission while every worker is busy is rejected with
//! [`SchedulingError::PoolSaturated`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::{Result, SchedulingError};

#[derive(Debug, Clone)]
pub struct WorkerPool {
    handle: Handle,
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool of `size` workers on the given runtime
    pub fn new(handle: Handle, size: usize) -> Self {
        let size = if size == 0 {
            log::warn!("Worker pool size 0 requested, using 1");
            1
        } else {
            size
        };
        Self {
            handle,
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of jobs currently running
    pub fn active(&self) -> usize {
        self.size.saturating_sub(self.permits.available_permits())
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Hand a job to a free worker
    pub fn submit<F>(&self, job: F) -> std::result::Result<(), SchedulingError>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                log::warn!("Worker pool saturated, rejecting job");
                return Err(SchedulingError::PoolSaturated { size: self.size });
            }
            Err(TryAcquireError::Closed) => return Err(SchedulingError::PoolClosed),
        };

        self.handle.spawn_blocking(move || {
            let _permit = permit;
            match catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::error!("Worker job failed: {}", e),
                Err(_) => log::error!("Worker job panicked"),
            }
        });
        Ok(())
    }

    /// Wait up to `timeout` for running jobs, then refuse new ones
    ///
    /// Returns whether every job finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if self.permits.is_closed() {
            return true;
        }

        let permits = u32::try_from(self.size).unwrap_or(u32::MAX);
        let drained = match tokio::time::timeout(timeout, self.permits.acquire_many(permits)).await {
            Ok(Ok(all)) => {
                all.forget();
                true
            }
            Ok(Err(_)) => true,
            Err(_) => {
                log::warn!(
                    "Worker pool drain timed out after {:?} with {} jobs running",
                    timeout,
                    self.active()
                );
                false
            }
        };

        self.permits.close();
        log::info!("Worker pool shut down");
        drained
    }
}
