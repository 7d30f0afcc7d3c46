//! Counting admission gates with RAII permits.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::JobError;

#[derive(Debug, Default)]
struct Occupancy {
    current: AtomicUsize,
    peak: AtomicUsize,
    admitted: AtomicUsize,
    released: AtomicUsize,
}

/// A counting admission control bounding concurrent occupants of a stage.
///
/// Occupancy is recorded on entry and exit so the peak can be inspected
/// after a batch. The counter is decremented before the semaphore permit is
/// returned, so `occupied() <= capacity()` holds at every instant.
#[derive(Debug)]
pub struct Gate {
    name: &'static str,
    capacity: usize,
    semaphore: Arc<Semaphore>,
    occupancy: Arc<Occupancy>,
}

impl Gate {
    /// Create a gate with `capacity` slots (at least one).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            occupancy: Arc::new(Occupancy::default()),
        }
    }

    /// Wait for a free slot, or until `cancel` fires.
    ///
    /// Cancellation wins over a slot that becomes free at the same time.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<GatePermit, JobError> {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(JobError::Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit.map_err(|_| JobError::Cancelled)?
            }
        };

        let now = self.occupancy.current.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.occupancy.peak.fetch_max(now, Ordering::SeqCst);
        let _ = self.occupancy.admitted.fetch_add(1, Ordering::SeqCst);
        trace!(gate = self.name, occupied = now, "gate entered");

        Ok(GatePermit {
            gate: self.name,
            occupancy: Arc::clone(&self.occupancy),
            _permit: permit,
        })
    }

    /// Gate name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Configured number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn occupied(&self) -> usize {
        self.occupancy.current.load(Ordering::SeqCst)
    }

    /// Highest simultaneous occupancy observed.
    pub fn peak(&self) -> usize {
        self.occupancy.peak.load(Ordering::SeqCst)
    }

    /// Total permits handed out.
    pub fn admitted(&self) -> usize {
        self.occupancy.admitted.load(Ordering::SeqCst)
    }

    /// Total permits given back.
    pub fn released(&self) -> usize {
        self.occupancy.released.load(Ordering::SeqCst)
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Proof of occupancy; the slot is released when this is dropped.
#[derive(Debug)]
pub struct GatePermit {
    gate: &'static str,
    occupancy: Arc<Occupancy>,
    /// Returned to the semaphore after `drop` runs.
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Name of the gate this permit belongs to.
    pub fn gate(&self) -> &'static str {
        self.gate
    }
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let _ = self.occupancy.current.fetch_sub(1, Ordering::SeqCst);
        let _ = self.occupancy.released.fetch_add(1, Ordering::SeqCst);
        trace!(gate = self.gate, "gate left");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn zero_capacity_is_clamped() {
        let gate = Gate::new("decode", 0);
        assert_eq!(gate.capacity(), 1);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn permit_drop_releases_slot() {
        let gate = Gate::new("infer", 2);
        let cancel = CancellationToken::new();

        let a = gate.acquire(&cancel).await.unwrap();
        let b = gate.acquire(&cancel).await.unwrap();
        assert_eq!(a.gate(), "infer");
        assert_eq!(gate.occupied(), 2);
        assert_eq!(gate.available(), 0);

        drop(a);
        assert_eq!(gate.occupied(), 1);
        assert_eq!(gate.available(), 1);
        drop(b);

        assert_eq!(gate.occupied(), 0);
        assert_eq!(gate.peak(), 2);
        assert_eq!(gate.admitted(), 2);
        assert_eq!(gate.released(), 2);
    }

    #[tokio::test]
    async fn full_gate_blocks_until_release() {
        let gate = Arc::new(Gate::new("decode", 1));
        let cancel = CancellationToken::new();
        let held = gate.acquire(&cancel).await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
        assert_eq!(gate.peak(), 1);
    }

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let gate = Arc::new(Gate::new("infer", 1));
        let cancel = CancellationToken::new();
        let _held = gate.acquire(&cancel).await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await.map(|_| ()) })
        };
        cancel.cancel();

        assert_matches!(waiter.await.unwrap(), Err(JobError::Cancelled));
        assert_eq!(gate.admitted(), 1);
    }

    #[tokio::test]
    async fn cancelled_token_refuses_free_slot() {
        let gate = Gate::new("decode", 4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_matches!(gate.acquire(&cancel).await, Err(JobError::Cancelled));
        assert_eq!(gate.available(), 4);
    }
}
