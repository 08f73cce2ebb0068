//! Counters for the aquifer subsystem.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals since the service was created.
#[derive(Debug, Default)]
pub struct AquiferStats {
    sampled: AtomicU64,
    smoothed: AtomicU64,
    sample_failures: AtomicU64,
    smooth_deferrals: AtomicU64,
    dropped: AtomicU64,
    requeued: AtomicU64,
}

/// A point-in-time copy of [`AquiferStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Raw ratings computed.
    pub sampled: u64,
    /// Smoothing passes completed.
    pub smoothed: u64,
    /// Samples that found the cell unavailable.
    pub sample_failures: u64,
    /// Smoothing passes deferred for lack of neighbours.
    pub smooth_deferrals: u64,
    /// Cells given up on by the failure sweep.
    pub dropped: u64,
    /// Cells moved from the failure table back to the queue.
    pub requeued: u64,
}

impl AquiferStats {
    pub(crate) fn add_sampled(&self) {
        self.sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_smoothed(&self) {
        self.smoothed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_sample_failure(&self) {
        self.sample_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_smooth_deferral(&self) {
        self.smooth_deferrals.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped(&self, count: usize) {
        self.dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn add_requeued(&self, count: usize) {
        self.requeued.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Copies the current values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sampled: self.sampled.load(Ordering::Relaxed),
            smoothed: self.smoothed.load(Ordering::Relaxed),
            sample_failures: self.sample_failures.load(Ordering::Relaxed),
            smooth_deferrals: self.smooth_deferrals.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        }
    }
}
