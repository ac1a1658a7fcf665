// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduler operation counters.
//!
//! All fields use relaxed atomics which is sufficient because consumers only
//! need monotonic snapshots for observability.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the scheduler and the resize controller.
#[derive(Debug, Default)]
pub struct SchedMetrics {
    pub allocs: AtomicU64,
    pub frees: AtomicU64,
    pub mark_updates: AtomicU64,
    /// Controller grow passes that added slabs.
    pub grows: AtomicU64,
    /// Controller shrink passes that released slabs.
    pub shrinks: AtomicU64,
    /// Buffers written to the swap file (controller batches and synchronous
    /// eviction on the alloc/swapin paths).
    pub swapouts: AtomicU64,
    /// Buffers restored from the swap file.
    pub swapins: AtomicU64,
    /// MRU-tail reclaim decisions. Every eviction also counts a swapout,
    /// but not every future swapout path has to be an eviction.
    pub evictions: AtomicU64,
}

/// Point-in-time copy of [`SchedMetrics`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub allocs: u64,
    pub frees: u64,
    pub mark_updates: u64,
    pub grows: u64,
    pub shrinks: u64,
    pub swapouts: u64,
    pub swapins: u64,
    pub evictions: u64,
}

impl SchedMetrics {
    #[inline]
    pub(crate) fn record_alloc(&self) {
        self.allocs.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_free(&self) {
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_mark_updated(&self) {
        self.mark_updates.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_grow(&self) {
        self.grows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_shrink(&self) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_swapout(&self) {
        self.swapouts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_swapin(&self) {
        self.swapins.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Return the current counters without synchronisation penalties.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocs: self.allocs.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            mark_updates: self.mark_updates.load(Ordering::Relaxed),
            grows: self.grows.load(Ordering::Relaxed),
            shrinks: self.shrinks.load(Ordering::Relaxed),
            swapouts: self.swapouts.load(Ordering::Relaxed),
            swapins: self.swapins.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let metrics = SchedMetrics::default();
        metrics.record_alloc();
        metrics.record_alloc();
        metrics.record_free();
        metrics.record_swapout();
        metrics.record_eviction();

        let snap = metrics.snapshot();
        assert_eq!(snap.allocs, 2);
        assert_eq!(snap.frees, 1);
        assert_eq!(snap.swapouts, 1);
        assert_eq!(snap.swapins, 0);
        assert_eq!(snap.evictions, 1);
    }
}
