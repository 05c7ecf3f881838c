//! # Worker identity allocation.
//!
//! ```text
//! free = {1 ..= desired} \ alive ids
//! allocate() = min(free)            (empty → AllocationError::Exhausted)
//! ```
//!
//! ## Rules
//! - Pure: reads the census and the desired count, nothing else.
//! - Reclamation is implicit: an id becomes free again once its worker is
//!   removed from the census, which happens only after the OS reaped it.
//! - A spawn event implies capacity, so exhaustion is a logic error.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::AllocationError;
use crate::worker::WorkerId;

/// Read-only view of the live workers.
pub trait WorkerCensus {
    /// `true` if a live worker currently holds `id`.
    fn is_alive(&self, id: WorkerId) -> bool;

    /// Number of live workers.
    fn alive_count(&self) -> usize;
}

/// Shared desired worker count; never below 1.
#[derive(Clone, Debug)]
pub struct DesiredWorkers(Arc<AtomicUsize>);

impl DesiredWorkers {
    /// Creates the counter (0 is raised to 1).
    pub fn new(count: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(count.max(1))))
    }

    /// Current value.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Adds one worker; returns the new value.
    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Removes one worker, keeping at least one; returns the new value.
    pub fn decrement(&self) -> usize {
        let prev = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1).max(1))
            })
            .unwrap_or_else(|n| n);
        prev.saturating_sub(1).max(1)
    }
}

/// Hands out the smallest free worker id.
#[derive(Clone, Debug)]
pub struct WorkerIdentityAllocator {
    desired: DesiredWorkers,
}

impl WorkerIdentityAllocator {
    /// Allocator bound to a shared desired count.
    pub fn new(desired: DesiredWorkers) -> Self {
        Self { desired }
    }

    /// The shared desired count.
    pub fn desired(&self) -> &DesiredWorkers {
        &self.desired
    }

    /// Smallest id in `1..=desired` not held by a live worker.
    pub fn allocate(&self, census: &impl WorkerCensus) -> Result<WorkerId, AllocationError> {
        let desired = self.desired.get();
        (1..=desired)
            .filter_map(|n| u32::try_from(n).ok().and_then(WorkerId::new))
            .find(|id| !census.is_alive(*id))
            .ok_or(AllocationError::Exhausted {
                desired,
                alive: census.alive_count(),
            })
    }
}

/// Callbacks the manager invokes around each worker creation.
///
/// Both run on the manager's event loop; keep them short.
pub trait SpawnHooks: Send + Sync + 'static {
    /// Called after `id` was allocated, before the worker process is spawned.
    fn pre_spawn(&self, _id: WorkerId) {}

    /// Called once the worker process exists.
    fn post_spawn(&self, _id: WorkerId, _pid: u32) {}
}

/// No-op [`SpawnHooks`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl SpawnHooks for NoHooks {}
