//! The aquifer subsystem as one owned instance.
//!
//! [`AquiferService`] owns the scheduler, the wellspring registry and the table
//! of loaded cells, and talks to the cache through [`AquiferStore`]. Hosts feed
//! it load and unload signals and either call [`drain_pending`] and
//! [`sweep_failures`] from their own tick, or spawn [`run`] on a tokio runtime.
//!
//! [`drain_pending`]: AquiferService::drain_pending
//! [`sweep_failures`]: AquiferService::sweep_failures
//! [`run`]: AquiferService::run

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tokio::task::spawn_blocking;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use wellspring_utils::locks::SyncRwLock;
use wellspring_utils::{BlockPos, CellKey};

use crate::config::AquiferConfig;
use crate::error::{AquiferError, ServiceError};
use crate::rating::{AquiferRecord, Rating};
use crate::sampler::AquiferSampler;
use crate::scheduler::{PendingEntry, Scheduler, SweepReport};
use crate::smoother::smooth;
use crate::stats::{AquiferStats, StatsSnapshot};
use crate::store::{AquiferStore, MemoryStore};
use crate::terrain::SharedCellHandle;
use crate::wellspring::{Allocation, Wellspring, WellspringRegistry, allocate};

/// Where a cell currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    /// Nothing is known about the cell.
    Unseen,
    /// Waiting in the pending queue.
    Queued,
    /// Being computed by a worker.
    InFlight,
    /// Waiting in the failure table.
    Failed {
        /// Failed attempts so far.
        attempts: u32,
    },
    /// A current record is cached.
    Cached {
        /// Whether the record carries a smoothed rating.
        smoothed: bool,
    },
}

/// Counts from one drain of the pending queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Cells claimed from the queue.
    pub claimed: usize,
    /// Cells that ended with a cached record.
    pub completed: usize,
    /// Cells filed into the failure table.
    pub failed: usize,
    /// Cells unloaded while being computed.
    pub discarded: usize,
}

impl DrainReport {
    const fn merge(&mut self, other: Self) {
        self.claimed += other.claimed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.discarded += other.discarded;
    }
}

enum CellOutcome {
    Completed,
    Failed,
    Discarded,
}

/// Computes, caches and serves aquifer ratings.
pub struct AquiferService {
    config: AquiferConfig,
    sampler: AquiferSampler,
    store: Arc<dyn AquiferStore>,
    scheduler: Scheduler,
    wellsprings: WellspringRegistry,
    loaded: SyncRwLock<FxHashMap<CellKey, SharedCellHandle>>,
    stats: AquiferStats,
    pool: rayon::ThreadPool,
}

impl AquiferService {
    /// Creates a service on top of `store`.
    ///
    /// # Errors
    /// Fails if the config does not validate or the worker pool cannot be
    /// spawned.
    pub fn new(config: AquiferConfig, store: Arc<dyn AquiferStore>) -> Result<Self, ServiceError> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.scheduler.resolved_workers())
            .thread_name(|i| format!("aquifer-worker-{i}"))
            .build()?;

        Ok(Self {
            sampler: AquiferSampler::new(config.sampler.clone()),
            scheduler: Scheduler::new(
                config.scheduler.max_attempts,
                config.scheduler.max_resmooth_passes,
            ),
            config,
            store,
            wellsprings: WellspringRegistry::new(),
            loaded: SyncRwLock::new(FxHashMap::default()),
            stats: AquiferStats::default(),
            pool,
        })
    }

    /// Creates a service backed by a fresh [`MemoryStore`].
    ///
    /// # Errors
    /// See [`new`](Self::new).
    pub fn with_memory_store(config: AquiferConfig) -> Result<Self, ServiceError> {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &AquiferConfig {
        &self.config
    }

    /// The cache this service reads and writes.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn AquiferStore> {
        &self.store
    }

    /// Signals that a cell's terrain became available.
    ///
    /// A cell still in the failure table starts over with zero attempts.
    /// Failing cells whose terrain has become valid are requeued as well, and
    /// so are neighbours that were waiting for someone to smooth against.
    pub fn on_region_loaded(&self, key: CellKey, handle: SharedCellHandle) {
        {
            let mut loaded = self.loaded.write();
            loaded.insert(key, handle.clone());
            self.scheduler.clear_failure(key);
            self.scheduler.enqueue(key, handle);
        }

        let recovered = self.scheduler.requeue_recovered(key);
        if recovered > 0 {
            self.stats.add_requeued(recovered);
            log::debug!("Loading {key} requeued {recovered} recovered aquifer cells");
        }
    }

    /// Signals that a cell's terrain went away.
    ///
    /// Removes the cell from the queue, the failure table and the cache. A
    /// worker still computing it finishes without writing anything.
    pub fn on_region_unloaded(&self, key: CellKey) {
        let mut loaded = self.loaded.write();
        loaded.remove(&key);
        self.scheduler.forget(key);
        self.store.remove(key);
    }

    /// Number of cells currently loaded.
    #[must_use]
    pub fn loaded_len(&self) -> usize {
        self.loaded.read().len()
    }

    /// The rating of a cell: smoothed if available, else raw.
    #[must_use]
    pub fn get_rating(&self, key: CellKey) -> Option<Rating> {
        self.current_record(key).map(|record| record.effective())
    }

    /// Registers a wellspring. Returns whether the position was new.
    pub fn register_wellspring(&self, position: BlockPos, depth_factor: f64) -> bool {
        self.wellsprings.register(position, depth_factor)
    }

    /// Unregisters a wellspring. Returns whether one was there.
    pub fn unregister_wellspring(&self, position: BlockPos) -> bool {
        self.wellsprings.unregister(position)
    }

    /// A snapshot of the wellsprings in a cell.
    #[must_use]
    pub fn list_wellsprings(&self, key: CellKey) -> Vec<Wellspring> {
        self.wellsprings.list_for_cell(key)
    }

    /// This tick's output of every wellspring in a cell. A cell without a
    /// rating allocates nothing.
    #[must_use]
    pub fn allocate(&self, key: CellKey) -> Vec<Allocation> {
        let budget = self
            .get_rating(key)
            .map_or(0.0, |rating| f64::from(rating.value));
        allocate(budget, &self.wellsprings.list_for_cell(key))
    }

    /// Drops every cached record and queues the loaded cells for recompute.
    /// Wellsprings are kept.
    pub fn clear_all(&self) {
        self.store.clear();
        self.scheduler.clear_resmooth();

        let loaded: Vec<(CellKey, SharedCellHandle)> = self
            .loaded
            .read()
            .iter()
            .map(|(key, handle)| (*key, handle.clone()))
            .collect();
        let count = loaded.len();
        for (key, handle) in loaded {
            self.scheduler.clear_failure(key);
            self.scheduler.enqueue(key, handle);
        }
        log::info!("Cleared aquifer cache, {count} loaded cells queued for recompute");
    }

    /// Where a cell is in its lifecycle.
    #[must_use]
    pub fn cell_state(&self, key: CellKey) -> CellState {
        if self.scheduler.is_in_flight(key) {
            CellState::InFlight
        } else if self.scheduler.is_pending(key) {
            CellState::Queued
        } else if let Some(attempts) = self.scheduler.failure_attempts(key) {
            CellState::Failed { attempts }
        } else if let Some(record) = self.current_record(key) {
            CellState::Cached {
                smoothed: record.smoothed.is_some(),
            }
        } else {
            CellState::Unseen
        }
    }

    /// Counters since the service was created.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of queued cells.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.scheduler.pending_len()
    }

    /// Number of cells in the failure table.
    #[must_use]
    pub fn failures_len(&self) -> usize {
        self.scheduler.failures_len()
    }

    /// Claims one batch from the pending queue and computes it on the worker
    /// pool. Blocks until the batch is done.
    #[tracing::instrument(level = "trace", skip(self), name = "aquifer_drain")]
    pub fn drain_pending(&self) -> DrainReport {
        let batch = self.scheduler.claim_batch(self.config.scheduler.drain_batch);
        let mut report = DrainReport {
            claimed: batch.len(),
            ..DrainReport::default()
        };
        if batch.is_empty() {
            return report;
        }

        let outcomes: Vec<CellOutcome> = self
            .pool
            .install(|| batch.into_par_iter().map(|entry| self.process(entry)).collect());

        for outcome in outcomes {
            match outcome {
                CellOutcome::Completed => report.completed += 1,
                CellOutcome::Failed => report.failed += 1,
                CellOutcome::Discarded => report.discarded += 1,
            }
        }
        log::debug!(
            "Aquifer drain: {} claimed, {} completed, {} failed, {} discarded",
            report.claimed,
            report.completed,
            report.failed,
            report.discarded
        );
        report
    }

    /// Drains until the pending queue is empty.
    pub fn drain_until_idle(&self) -> DrainReport {
        let mut total = DrainReport::default();
        loop {
            let report = self.drain_pending();
            if report.claimed == 0 {
                return total;
            }
            total.merge(report);
        }
    }

    /// Sweeps the failure table once.
    ///
    /// A dropped cell loses its cached record and stays without a rating
    /// until it is loaded again.
    pub fn sweep_failures(&self) -> SweepReport {
        let report = {
            let _loaded = self.loaded.write();
            let report = self.scheduler.sweep();
            for key in &report.dropped_cells {
                self.scheduler.forget(*key);
                self.store.remove(*key);
            }
            report
        };
        self.stats.add_requeued(report.requeued);
        self.stats.add_dropped(report.dropped);
        if report != SweepReport::default() {
            log::debug!(
                "Aquifer sweep: {} requeued, {} dropped, {} waiting",
                report.requeued,
                report.dropped,
                report.waiting
            );
        }
        report
    }

    /// Drives draining and sweeping at the configured intervals until
    /// `cancel_token` is cancelled.
    pub async fn run(self: Arc<Self>, cancel_token: CancellationToken) {
        let scheduler = &self.config.scheduler;
        let mut drain = interval(Duration::from_millis(scheduler.drain_interval_ms));
        drain.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep = interval(Duration::from_millis(scheduler.sweep_interval_ms));
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "Aquifer service started with {} workers",
            self.pool.current_num_threads()
        );

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = drain.tick() => self.clone().drain_tick().await,
                _ = sweep.tick() => {
                    self.sweep_failures();
                }
            }
        }

        log::info!("Aquifer service stopped");
    }

    async fn drain_tick(self: Arc<Self>) {
        let start = Instant::now();
        let service = self.clone();
        let report = match spawn_blocking(move || service.drain_pending()).await {
            Ok(report) => report,
            Err(err) => {
                log::error!("Aquifer drain task failed: {err}");
                return;
            }
        };

        let elapsed = start.elapsed();
        if elapsed.as_millis() >= u128::from(self.config.scheduler.slow_drain_warn_ms) {
            tracing::warn!(
                ?elapsed,
                claimed = report.claimed,
                completed = report.completed,
                failed = report.failed,
                discarded = report.discarded,
                pending = self.scheduler.pending_len(),
                "Aquifer drain slow"
            );
        }
    }

    fn current_record(&self, key: CellKey) -> Option<AquiferRecord> {
        self.store.get(key).filter(AquiferRecord::is_current)
    }

    /// Runs `write` only while `key` is still loaded with `handle`.
    fn fenced<R>(
        &self,
        key: CellKey,
        handle: &SharedCellHandle,
        write: impl FnOnce() -> R,
    ) -> Option<R> {
        let loaded = self.loaded.read();
        let still_loaded = loaded
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        still_loaded.then(write)
    }

    fn process(&self, entry: PendingEntry) -> CellOutcome {
        let key = entry.key;
        let outcome = match self.compute(&entry) {
            Ok(true) => {
                self.scheduler.clear_failure(key);
                CellOutcome::Completed
            }
            Ok(false) => CellOutcome::Discarded,
            Err(err) => {
                match err {
                    AquiferError::CellUnavailable(_) => self.stats.add_sample_failure(),
                    AquiferError::NeedsRetry(_) => self.stats.add_smooth_deferral(),
                }
                let handle = entry.handle.clone();
                let kind = err.kind();
                match self.fenced(key, &handle, || self.scheduler.record_failure(entry, kind)) {
                    Some(attempts) => {
                        log::debug!("Aquifer cell {key} failed (attempt {attempts}): {err}");
                        CellOutcome::Failed
                    }
                    None => CellOutcome::Discarded,
                }
            }
        };
        self.scheduler.release(key);
        outcome
    }

    /// Samples and smooths one cell. Returns `false` if the cell was unloaded
    /// before its result could be written.
    fn compute(&self, entry: &PendingEntry) -> Result<bool, AquiferError> {
        let key = entry.key;
        let handle = &entry.handle;
        if !handle.is_valid() {
            return Err(AquiferError::CellUnavailable(key));
        }

        let record = match self.current_record(key) {
            Some(record) => record,
            None => {
                let raw = self.sampler.sample(handle.as_ref(), key)?;
                self.stats.add_sampled();
                let record = AquiferRecord::new(raw);
                if self.fenced(key, handle, || self.store.put(key, record)).is_none() {
                    return Ok(false);
                }
                self.wake_neighbors(key);
                record
            }
        };

        if record.smoothed.is_some() && !self.scheduler.needs_resmooth(key) {
            return Ok(true);
        }

        let outcome = smooth(key, record.raw, handle.world_seed(), |neighbor| {
            self.neighbor_record(neighbor)
        })?;
        self.stats.add_smoothed();

        let smoothed = record.with_smoothed(outcome.rating);
        let written = self.fenced(key, handle, || {
            self.store.put(key, smoothed);
            if outcome.is_complete() {
                self.scheduler.note_complete_smooth(key);
            } else {
                self.scheduler.note_partial_smooth(key);
            }
        });
        Ok(written.is_some())
    }

    /// A neighbour's record, if it is loaded, valid and current.
    fn neighbor_record(&self, key: CellKey) -> Option<AquiferRecord> {
        let valid = self
            .loaded
            .read()
            .get(&key)
            .is_some_and(|handle| handle.is_valid());
        if valid { self.current_record(key) } else { None }
    }

    /// Requeues loaded neighbours waiting for another smoothing pass.
    fn wake_neighbors(&self, key: CellKey) {
        let woken: Vec<(CellKey, SharedCellHandle)> = {
            let loaded = self.loaded.read();
            key.neighbors()
                .filter(|neighbor| self.scheduler.needs_resmooth(*neighbor))
                .filter_map(|neighbor| loaded.get(&neighbor).map(|h| (neighbor, h.clone())))
                .collect()
        };
        for (neighbor, handle) in woken {
            self.scheduler.enqueue(neighbor, handle);
        }
    }
}
