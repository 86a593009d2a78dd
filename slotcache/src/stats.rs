//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time statistics snapshot for a cache instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Get operations that found a value.
    pub hits: u64,
    /// Get operations that found the slot empty.
    pub misses: u64,
    /// Completed put operations.
    pub puts: u64,
    /// Completed remove operations.
    pub removes: u64,
    /// Cells that stopped voluntarily, either idle or after an
    /// empty read.
    pub passivations: u64,
    /// Cells materialized over the cache's lifetime.
    pub cells_created: u64,
    /// Cells currently alive.
    pub live_cells: usize,
}

/// Lifetime counters, updated lock-free from many tasks.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
    passivations: AtomicU64,
    cells_created: AtomicU64,
}

impl Counters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_passivation(&self) {
        self.passivations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cell_created(&self) {
        self.cells_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, live_cells: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            passivations: self.passivations.load(Ordering::Relaxed),
            cells_created: self.cells_created.load(Ordering::Relaxed),
            live_cells,
        }
    }
}
