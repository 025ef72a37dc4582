//! Caller-owned admission gate shared across runs.
//!
//! The engine only acquires and releases tokens; creating, sizing and
//! closing the gate is the caller's business.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Counting gate that bounds how many operations run at once across every
/// batch holding a clone of it.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate with `capacity` tokens (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a token. Fails only once the gate has been closed.
    pub async fn acquire(&self) -> Result<GatePermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a token without waiting, if one is free.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tokens currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tokens currently held.
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available())
    }

    /// Close the gate. Pending and future acquisitions fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// RAII token; dropping it returns the slot to the gate.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}
