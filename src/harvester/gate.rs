//! Counting admission gate for in-flight requests
//!
//! Thin wrapper around a [`tokio::sync::Semaphore`]. A [`GatePermit`] is held
//! for the duration of one request and returned when dropped, so the slot is
//! released on success, error and cancellation alike.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps the number of simultaneous holders at `max`
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max: usize,
}

/// One admitted slot; released on drop
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `max` holders (at least one)
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    /// Waits for a free slot
    ///
    /// Returns `None` only if the gate has been closed.
    pub async fn acquire(&self) -> Option<GatePermit> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        Some(GatePermit { _permit: permit })
    }

    /// Configured maximum number of holders
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of currently free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Number of current holders
    pub fn in_use(&self) -> usize {
        self.max - self.available()
    }

    /// Closes the gate; pending and future acquisitions return `None`
    pub fn close(&self) {
        self.semaphore.close();
    }
}
