//! Deterministic random sources.
//!
//! Every cell gets its own stream derived from the world seed and the cell
//! coordinates, so the same world always yields the same variance no matter
//! in which order cells are computed or how often they are retried.

pub mod xoroshiro;

use crate::CellKey;

use xoroshiro::Xoroshiro;

const X_PRIME: i64 = 341_873_128_712;
const Z_PRIME: i64 = 132_897_987_541;
const Y_PRIME: i64 = 42_317_861;

/// A source of pseudo-random numbers.
pub trait Random {
    /// Returns the next 64 random bits.
    fn next_u64(&mut self) -> u64;

    /// Returns the next 32 random bits.
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Returns a double uniformly distributed in `[0, 1)`.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * f64::from_bits(0x3CA0_0000_0000_0000)
    }

    /// Returns a double uniformly distributed in `[min, max)`.
    fn next_f64_between(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_f64() * (max - min)
    }

    /// Returns an int uniformly distributed in `[0, bound)`. `bound` must be positive.
    fn next_i32_bounded(&mut self, bound: i32) -> i32 {
        debug_assert!(bound > 0, "bound must be positive");
        let product = u64::from(self.next_u32()) * u64::from(bound.unsigned_abs());
        (product >> 32) as i32
    }

    /// Returns an int uniformly distributed in `[min, max]`.
    fn next_i32_between_inclusive(&mut self, min: i32, max: i32) -> i32 {
        min + self.next_i32_bounded(max - min + 1)
    }

    /// Returns true with the given probability.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }
}

/// Mixes the world seed with a cell's coordinates.
///
/// Each axis is multiplied by its own large odd constant and folded in with
/// XOR.
#[must_use]
pub const fn cell_seed(world_seed: i64, key: CellKey) -> i64 {
    world_seed
        ^ (key.x as i64).wrapping_mul(X_PRIME)
        ^ (key.z as i64).wrapping_mul(Z_PRIME)
        ^ (key.y as i64).wrapping_mul(Y_PRIME)
}

/// Creates the random stream for one cell.
///
/// `salt` separates independent consumers of the same cell (scoring and
/// smoothing) so that neither shifts the other's draws.
#[must_use]
pub fn cell_random(world_seed: i64, key: CellKey, salt: u64) -> Xoroshiro {
    Xoroshiro::from_seed(cell_seed(world_seed, key) as u64 ^ salt)
}
