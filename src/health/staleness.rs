//! Process-wide freshness high-water mark.
//!
//! Every successful probe folds its jussi number in with a single atomic
//! `fetch_max`, so the mark never decreases and concurrent probes cannot lose
//! each other's updates.

use std::sync::atomic::{AtomicI64, Ordering};

/// Freshness value some nodes report when their own indexer is broken.
pub const POISON_FRESHNESS: i64 = 20_000_000;

#[derive(Debug)]
pub struct SharedStaleness {
    high_water: AtomicI64,
}

impl SharedStaleness {
    pub fn new() -> Self {
        Self {
            high_water: AtomicI64::new(-1),
        }
    }

    /// Fold `freshness` into the mark and return the mark after the update.
    pub fn observe(&self, freshness: i64) -> i64 {
        let previous = self.high_water.fetch_max(freshness, Ordering::SeqCst);
        previous.max(freshness)
    }

    pub fn current(&self) -> i64 {
        self.high_water.load(Ordering::SeqCst)
    }
}

/// How far `freshness` trails `high_water`, widened so node-supplied
/// extremes cannot overflow.
pub fn lag(high_water: i64, freshness: i64) -> i128 {
    i128::from(high_water) - i128::from(freshness)
}

impl Default for SharedStaleness {
    fn default() -> Self {
        Self::new()
    }
}
