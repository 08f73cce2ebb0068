//! Neighbour-aware smoothing of raw ratings.
//!
//! A cell that sits next to a stronger aquifer inherits part of it: the
//! rating bleeds down from the strongest neighbour by a random 20–50%. A cell
//! stronger than all of its neighbours keeps its raw value.
//!
//! Smoothing is not idempotent. Running it again after more neighbours have
//! been computed can change the result, and there is no fixed point. Callers
//! bound how often a cell is re-smoothed instead of iterating to convergence.

use wellspring_utils::CellKey;
use wellspring_utils::random::{Random, cell_random};

use crate::error::AquiferError;
use crate::rating::{AquiferRecord, Rating};

/// Number of cells in the 3×3×3 cube around a cell, excluding itself.
pub const NEIGHBOR_COUNT: usize = 26;

/// Salt that selects the smoothing stream of a cell.
const SMOOTH_STREAM: u64 = 0x5300_7400_0000_0001;

const REDUCTION_MIN: f64 = 0.2;
const REDUCTION_MAX: f64 = 0.5;

/// Result of one smoothing pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SmoothOutcome {
    /// The smoothed rating.
    pub rating: Rating,
    /// How many of the 26 neighbours contributed.
    pub valid_neighbors: usize,
}

impl SmoothOutcome {
    /// Whether every neighbour contributed. Only then is the result final.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.valid_neighbors == NEIGHBOR_COUNT
    }
}

/// Smooths `raw` against the records of `key`'s neighbours.
///
/// `neighbor_lookup` returns the record of a neighbour, or `None` if that
/// neighbour is unavailable or not computed yet. With no usable neighbour at
/// all the pass is deferred with [`AquiferError::NeedsRetry`].
pub fn smooth(
    key: CellKey,
    raw: Rating,
    world_seed: i64,
    mut neighbor_lookup: impl FnMut(CellKey) -> Option<AquiferRecord>,
) -> Result<SmoothOutcome, AquiferError> {
    let mut valid = 0usize;
    let mut salty = 0usize;
    let mut strongest = 0u8;

    for neighbor in key.neighbors() {
        let Some(record) = neighbor_lookup(neighbor) else {
            continue;
        };
        let rating = record.effective();
        valid += 1;
        if rating.is_salty {
            salty += 1;
        }
        strongest = strongest.max(rating.value);
    }

    if valid == 0 {
        return Err(AquiferError::NeedsRetry(key));
    }

    let value = if strongest > raw.value {
        let mut random = cell_random(world_seed, key, SMOOTH_STREAM);
        let reduction = random.next_f64_between(REDUCTION_MIN, REDUCTION_MAX);
        let strongest = f64::from(strongest);
        strongest - strongest * reduction
    } else {
        f64::from(raw.value)
    };

    Ok(SmoothOutcome {
        rating: Rating::from_score(value, salty * 2 > valid),
        valid_neighbors: valid,
    })
}
