//! Process-wide diagnostic gauges for pools and trees.
//!
//! All counters use `Relaxed` ordering and are updated from whichever thread
//! owns the pool at the time. Values are for display and tests only; nothing
//! in the crate reads them to make an allocation decision.

use std::sync::atomic::{AtomicIsize, Ordering};

/// Diagnostic-only gauge counter.
///
/// The raw value may transiently dip below zero when two owners race an
/// add against a subtract. Readers go through `get()`/`load()`, which clamp
/// negative values to zero.
pub struct Counter(AtomicIsize);

impl Counter {
    pub const fn new() -> Self {
        Self(AtomicIsize::new(0))
    }

    #[inline]
    fn delta(val: usize) -> isize {
        std::cmp::min(val, isize::MAX as usize).cast_signed()
    }

    #[inline]
    pub fn add(&self, val: usize) {
        self.0.fetch_add(Self::delta(val), Ordering::Relaxed);
    }

    #[inline]
    pub fn sub(&self, val: usize) {
        self.0.fetch_sub(Self::delta(val), Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn load(&self, ordering: Ordering) -> usize {
        self.0.load(ordering).max(0).cast_unsigned()
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bytes held by live pool arenas.
pub static POOL_ARENA_BYTES: Counter = Counter::new();
/// Buckets currently allocated across all pools.
pub static POOL_LIVE_BUCKETS: Counter = Counter::new();
/// Allocation requests that were refused (too large or exhausted).
pub static POOL_ALLOC_FAILURES: Counter = Counter::new();
/// Deallocations ignored because the pointer was not a live bucket.
pub static POOL_REJECTED_FREES: Counter = Counter::new();
/// Nodes currently linked into red-black trees.
pub static TREE_LIVE_NODES: Counter = Counter::new();

/// Snapshot of every gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub arena_bytes: usize,
    pub live_buckets: usize,
    pub alloc_failures: usize,
    pub rejected_frees: usize,
    pub tree_nodes: usize,
}

#[must_use]
pub fn snapshot() -> PoolStats {
    PoolStats {
        arena_bytes: POOL_ARENA_BYTES.get(),
        live_buckets: POOL_LIVE_BUCKETS.get(),
        alloc_failures: POOL_ALLOC_FAILURES.get(),
        rejected_frees: POOL_REJECTED_FREES.get(),
        tree_nodes: TREE_LIVE_NODES.get(),
    }
}
