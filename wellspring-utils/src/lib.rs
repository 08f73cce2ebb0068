//! Shared value types and primitives for the wellspring workspace.
//!
//! Nothing in here knows about aquifers: positions, seeded randomness, the
//! diminishing-returns curve, a small binary codec and lock aliases.

pub mod locks;
pub mod math;
pub mod pos;
pub mod random;
pub mod serial;

pub use pos::{BlockPos, CELL_SIZE, CellKey};
