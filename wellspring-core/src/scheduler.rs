//! Pending queue, in-flight claims, failure table and re-smoothing marks.
//!
//! Per-cell lifecycle:
//!
//! ```text
//! Unseen → Queued → InFlight → Cached
//!                      │
//!                      └→ Failed(attempts) → Queued (handle valid again)
//!                                          → Dropped (attempts reached cap)
//! ```
//!
//! The scheduler only tracks state; the service decides what a claimed entry
//! computes. A cell is claimed by moving it from the pending map into the
//! in-flight set under one lock, so at most one worker ever computes it.

use rustc_hash::{FxHashMap, FxHashSet};
use wellspring_utils::CellKey;
use wellspring_utils::locks::SyncMutex;

use crate::terrain::SharedCellHandle;

/// A queued unit of work.
#[derive(Clone)]
pub struct PendingEntry {
    /// The cell to compute.
    pub key: CellKey,
    /// Terrain access for the cell.
    pub handle: SharedCellHandle,
    /// Failed attempts carried over from the failure table.
    pub carried_attempts: u32,
}

/// Why a cell landed in the failure table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The terrain handle was not usable.
    CellUnavailable,
    /// Smoothing had no neighbour to work with.
    NeedsRetry,
}

/// A cell waiting to be retried.
#[derive(Clone)]
pub struct FailureEntry {
    /// The failing cell.
    pub key: CellKey,
    /// Terrain access for the cell.
    pub handle: SharedCellHandle,
    /// Failed attempts so far. Never decreases while the entry exists.
    pub attempts: u32,
    /// Category of the most recent failure.
    pub kind: FailureKind,
}

/// Counts from one sweep of the failure table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries moved back to the pending queue.
    pub requeued: usize,
    /// Entries given up on.
    pub dropped: usize,
    /// Entries left waiting.
    pub waiting: usize,
    /// Keys of the dropped entries.
    pub dropped_cells: Vec<CellKey>,
}

impl SweepReport {
    fn drop_cell(&mut self, key: CellKey, attempts: u32) {
        log::debug!("Dropping aquifer cell {key} after {attempts} attempts");
        self.dropped += 1;
        self.dropped_cells.push(key);
    }
}

/// Scheduling state of the aquifer subsystem.
pub struct Scheduler {
    max_attempts: u32,
    max_resmooth_passes: u32,
    pending: SyncMutex<FxHashMap<CellKey, PendingEntry>>,
    in_flight: SyncMutex<FxHashSet<CellKey>>,
    failures: SyncMutex<FxHashMap<CellKey, FailureEntry>>,
    resmooth: SyncMutex<FxHashMap<CellKey, u32>>,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(max_attempts: u32, max_resmooth_passes: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            max_resmooth_passes: max_resmooth_passes.max(1),
            pending: SyncMutex::new(FxHashMap::default()),
            in_flight: SyncMutex::new(FxHashSet::default()),
            failures: SyncMutex::new(FxHashMap::default()),
            resmooth: SyncMutex::new(FxHashMap::default()),
        }
    }

    /// Attempts after which a failing cell is dropped.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Queues a cell with a fresh attempt count, replacing any queued entry.
    pub fn enqueue(&self, key: CellKey, handle: SharedCellHandle) {
        self.requeue(PendingEntry {
            key,
            handle,
            carried_attempts: 0,
        });
    }

    fn requeue(&self, entry: PendingEntry) {
        self.pending.lock().insert(entry.key, entry);
    }

    /// Claims up to `limit` queued cells that nobody is computing.
    ///
    /// Cells already in flight stay queued and are picked up by a later
    /// drain once their current computation is released.
    pub fn claim_batch(&self, limit: usize) -> Vec<PendingEntry> {
        let mut pending = self.pending.lock();
        let mut in_flight = self.in_flight.lock();

        let keys: Vec<CellKey> = pending
            .keys()
            .filter(|key| !in_flight.contains(key))
            .take(limit)
            .copied()
            .collect();

        keys.into_iter()
            .filter_map(|key| {
                let entry = pending.remove(&key)?;
                in_flight.insert(key);
                Some(entry)
            })
            .collect()
    }

    /// Releases a claim taken by [`claim_batch`](Self::claim_batch).
    pub fn release(&self, key: CellKey) {
        self.in_flight.lock().remove(&key);
    }

    /// Files a failed attempt. Returns the new attempt count.
    pub fn record_failure(&self, entry: PendingEntry, kind: FailureKind) -> u32 {
        let mut failures = self.failures.lock();
        let attempts = failures
            .get(&entry.key)
            .map_or(0, |existing| existing.attempts)
            .max(entry.carried_attempts)
            + 1;
        failures.insert(
            entry.key,
            FailureEntry {
                key: entry.key,
                handle: entry.handle,
                attempts,
                kind,
            },
        );
        attempts
    }

    /// Removes a cell from the failure table after it computed successfully.
    pub fn clear_failure(&self, key: CellKey) {
        self.failures.lock().remove(&key);
    }

    /// Attempts recorded for a failing cell.
    #[must_use]
    pub fn failure_attempts(&self, key: CellKey) -> Option<u32> {
        self.failures.lock().get(&key).map(|entry| entry.attempts)
    }

    /// Sweeps the failure table.
    ///
    /// Entries at the attempt cap are dropped. Entries whose handle became
    /// valid are requeued: unavailable cells start over at zero attempts,
    /// deferred smoothing keeps its count so an isolated cell still gives up.
    /// Everything else counts one more attempt and is dropped on reaching the
    /// cap.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut requeue = Vec::new();

        {
            let mut failures = self.failures.lock();
            failures.retain(|key, entry| {
                if entry.attempts >= self.max_attempts {
                    report.drop_cell(*key, entry.attempts);
                    return false;
                }
                if entry.handle.is_valid() {
                    requeue.push(Self::recovered(entry));
                    report.requeued += 1;
                    return false;
                }
                entry.attempts += 1;
                if entry.attempts >= self.max_attempts {
                    report.drop_cell(*key, entry.attempts);
                    return false;
                }
                report.waiting += 1;
                true
            });
        }

        for entry in requeue {
            self.requeue(entry);
        }
        report
    }

    /// Requeues failing cells that the arrival of `loaded` may have
    /// unblocked, with their attempts reset. Returns how many moved.
    ///
    /// Unavailable cells move anywhere once their handle is valid. Deferred
    /// smoothing only moves for neighbours of `loaded`, since no other cell
    /// gains a neighbour from this load.
    pub fn requeue_recovered(&self, loaded: CellKey) -> usize {
        let mut requeue = Vec::new();
        self.failures.lock().retain(|key, entry| {
            let unblocked = match entry.kind {
                FailureKind::CellUnavailable => true,
                FailureKind::NeedsRetry => key.is_neighbor(loaded),
            };
            if unblocked && entry.handle.is_valid() {
                requeue.push(PendingEntry {
                    key: *key,
                    handle: entry.handle.clone(),
                    carried_attempts: 0,
                });
                false
            } else {
                true
            }
        });

        let count = requeue.len();
        for entry in requeue {
            self.requeue(entry);
        }
        count
    }

    fn recovered(entry: &FailureEntry) -> PendingEntry {
        PendingEntry {
            key: entry.key,
            handle: entry.handle.clone(),
            carried_attempts: match entry.kind {
                FailureKind::CellUnavailable => 0,
                FailureKind::NeedsRetry => entry.attempts,
            },
        }
    }

    /// Whether a cell carries a re-smoothing mark.
    #[must_use]
    pub fn needs_resmooth(&self, key: CellKey) -> bool {
        self.resmooth.lock().contains_key(&key)
    }

    /// Records a smoothing pass that saw fewer than 26 neighbours.
    ///
    /// Returns whether the cell stays marked for another pass; the mark is
    /// removed once the pass cap is reached.
    pub fn note_partial_smooth(&self, key: CellKey) -> bool {
        let mut resmooth = self.resmooth.lock();
        let passes = resmooth.entry(key).or_insert(0);
        *passes += 1;
        if *passes >= self.max_resmooth_passes {
            resmooth.remove(&key);
            log::debug!("Aquifer cell {key} reached the re-smoothing cap");
            false
        } else {
            true
        }
    }

    /// Records a smoothing pass that saw every neighbour.
    pub fn note_complete_smooth(&self, key: CellKey) {
        self.resmooth.lock().remove(&key);
    }

    /// Whether a cell is queued.
    #[must_use]
    pub fn is_pending(&self, key: CellKey) -> bool {
        self.pending.lock().contains_key(&key)
    }

    /// Whether a cell is being computed.
    #[must_use]
    pub fn is_in_flight(&self, key: CellKey) -> bool {
        self.in_flight.lock().contains(&key)
    }

    /// Number of queued cells.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of failing cells.
    #[must_use]
    pub fn failures_len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Removes every trace of a cell except an in-flight claim, which its
    /// worker releases.
    pub fn forget(&self, key: CellKey) {
        self.pending.lock().remove(&key);
        self.failures.lock().remove(&key);
        self.resmooth.lock().remove(&key);
    }

    /// Removes every re-smoothing mark.
    pub fn clear_resmooth(&self) {
        self.resmooth.lock().clear();
    }
}
