//! Wellsprings and the allocation of a cell's rating budget.
//!
//! A cell's rating is a shared, depleting budget. Each tick the consumer walks
//! the cell's wellsprings deepest first; each one asks for
//! `budget · depth_factor` and gets it while the budget lasts. Shallow springs
//! in a crowded cell may get nothing even though the rating is nonzero.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use wellspring_utils::locks::SyncRwLock;
use wellspring_utils::{BlockPos, CellKey};

/// An emitter placed by world content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wellspring {
    /// Block position of the emitter.
    pub position: BlockPos,
    /// Allocation priority and share, in `[0, 1]`.
    pub depth_factor: f64,
}

/// Output assigned to one wellspring for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Allocation {
    /// Block position of the emitter.
    pub position: BlockPos,
    /// The emitter's depth factor.
    pub depth_factor: f64,
    /// Amount allocated this tick.
    pub amount: f64,
}

/// Distributes `budget` over `wellsprings`, deepest first.
///
/// The result is ordered by descending depth factor. Its amounts never sum to
/// more than `budget`. A non-finite or non-positive budget allocates nothing.
#[must_use]
pub fn allocate(budget: f64, wellsprings: &[Wellspring]) -> Vec<Allocation> {
    let mut sorted = wellsprings.to_vec();
    sorted.sort_by(|a, b| b.depth_factor.total_cmp(&a.depth_factor));

    let budget = if budget.is_finite() { budget.max(0.0) } else { 0.0 };
    let mut remaining = budget;

    sorted
        .into_iter()
        .map(|spring| {
            let required = budget * spring.depth_factor;
            let amount = match remaining.partial_cmp(&required) {
                Some(Ordering::Greater | Ordering::Equal) => required,
                _ => remaining,
            };
            remaining -= amount;
            Allocation {
                position: spring.position,
                depth_factor: spring.depth_factor,
                amount,
            }
        })
        .collect()
}

fn sanitize_depth(position: BlockPos, depth_factor: f64) -> f64 {
    let clamped = if depth_factor.is_nan() {
        0.0
    } else {
        depth_factor.clamp(0.0, 1.0)
    };
    if clamped.to_bits() != depth_factor.to_bits() {
        log::warn!("Clamped depth factor {depth_factor} of wellspring at {position} to {clamped}");
    }
    clamped
}

/// Wellsprings grouped by the cell their position falls into.
#[derive(Default)]
pub struct WellspringRegistry {
    cells: SyncRwLock<FxHashMap<CellKey, SmallVec<[Wellspring; 4]>>>,
}

impl WellspringRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wellspring, replacing the depth factor of one already at
    /// `position`. Returns whether the position was new.
    pub fn register(&self, position: BlockPos, depth_factor: f64) -> bool {
        let depth_factor = sanitize_depth(position, depth_factor);
        let mut cells = self.cells.write();
        let springs = cells.entry(position.cell()).or_default();

        if let Some(existing) = springs.iter_mut().find(|s| s.position == position) {
            existing.depth_factor = depth_factor;
            return false;
        }
        springs.push(Wellspring {
            position,
            depth_factor,
        });
        true
    }

    /// Removes the wellspring at `position`. Returns whether one was there.
    pub fn unregister(&self, position: BlockPos) -> bool {
        let key = position.cell();
        let mut cells = self.cells.write();
        let Some(springs) = cells.get_mut(&key) else {
            return false;
        };

        let before = springs.len();
        springs.retain(|s| s.position != position);
        let removed = springs.len() != before;
        if springs.is_empty() {
            cells.remove(&key);
        }
        removed
    }

    /// A snapshot of the wellsprings in a cell.
    #[must_use]
    pub fn list_for_cell(&self, key: CellKey) -> Vec<Wellspring> {
        self.cells
            .read()
            .get(&key)
            .map(|springs| springs.to_vec())
            .unwrap_or_default()
    }

    /// Total number of registered wellsprings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.read().values().map(SmallVec::len).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spring(x: i32, depth_factor: f64) -> Wellspring {
        Wellspring {
            position: BlockPos::new(x, 10, 0),
            depth_factor,
        }
    }

    #[test]
    fn deepest_first_then_leftover() {
        let springs = [spring(0, 0.2), spring(1, 0.8), spring(2, 0.5)];
        let amounts: Vec<f64> = allocate(10.0, &springs).iter().map(|a| a.amount).collect();
        assert_eq!(amounts, vec![8.0, 2.0, 0.0]);
    }

    #[test]
    fn bad_budget_allocates_nothing() {
        let springs = [spring(0, 1.0)];
        for budget in [f64::NAN, f64::INFINITY, -5.0, 0.0] {
            assert_eq!(allocate(budget, &springs)[0].amount, 0.0);
        }
    }

    #[test]
    fn register_replaces_and_clamps() {
        let registry = WellspringRegistry::new();
        let pos = BlockPos::new(3, 70, -9);
        assert!(registry.register(pos, 0.4));
        assert!(!registry.register(pos, 7.0));

        let listed = registry.list_for_cell(pos.cell());
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].depth_factor, 1.0);

        registry.register(BlockPos::new(4, 70, -9), f64::NAN);
        assert_eq!(registry.list_for_cell(pos.cell())[1].depth_factor, 0.0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unregister_removes_empty_cells() {
        let registry = WellspringRegistry::new();
        let pos = BlockPos::new(0, 0, 0);
        registry.register(pos, 0.5);
        assert!(!registry.unregister(BlockPos::new(1, 0, 0)));
        assert!(registry.unregister(pos));
        assert!(!registry.unregister(pos));
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_is_detached() {
        let registry = WellspringRegistry::new();
        let pos = BlockPos::new(0, 0, 0);
        registry.register(pos, 0.5);
        let snapshot = registry.list_for_cell(pos.cell());
        registry.unregister(pos);
        assert_eq!(snapshot.len(), 1);
    }
}
