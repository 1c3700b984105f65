//! Global cap on concurrently live render surfaces.
//!
//! Browser instances cost an order of magnitude more than fetch slots, so
//! the cap is independent of (and usually smaller than) the batch size.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Semaphore-backed surface budget shared by all renderer tasks.
#[derive(Clone)]
pub struct SurfacePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl SurfacePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    /// Wait for a surface slot. The permit is held for the full lifetime of
    /// one render task and released when dropped, after surface teardown.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("surface pool semaphore closed");
        debug!(
            available = self.semaphore.available_permits(),
            capacity = self.capacity,
            "acquired render surface slot"
        );
        permit
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
