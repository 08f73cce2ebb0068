//! Block and cell coordinates.

use std::fmt;

use glam::IVec3;

/// Edge length of a cell in blocks. Cells are cubic chunk sections.
pub const CELL_SIZE: i32 = 16;

/// Shift that converts a block coordinate to a cell coordinate.
const CELL_SHIFT: i32 = 4;

/// An absolute block position in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct BlockPos(pub IVec3);

impl BlockPos {
    /// Creates a block position from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    /// The cell this block falls into.
    #[must_use]
    pub const fn cell(self) -> CellKey {
        CellKey::from_block(self)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0.x, self.0.y, self.0.z)
    }
}

/// Identity of one vertical chunk segment.
///
/// Used purely as a map key; the derived ordering carries no meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CellKey {
    /// Cell x coordinate.
    pub x: i32,
    /// Cell y coordinate (vertical segment index).
    pub y: i32,
    /// Cell z coordinate.
    pub z: i32,
}

impl CellKey {
    /// Creates a key from cell coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Converts a block coordinate on one axis to a cell coordinate.
    #[inline]
    #[must_use]
    pub const fn block_to_cell_coord(block: i32) -> i32 {
        block >> CELL_SHIFT
    }

    /// The cell containing the given block.
    #[must_use]
    pub const fn from_block(pos: BlockPos) -> Self {
        Self {
            x: Self::block_to_cell_coord(pos.0.x),
            y: Self::block_to_cell_coord(pos.0.y),
            z: Self::block_to_cell_coord(pos.0.z),
        }
    }

    /// The block with the smallest coordinates inside this cell.
    #[must_use]
    pub const fn min_block(self) -> BlockPos {
        BlockPos::new(
            self.x << CELL_SHIFT,
            self.y << CELL_SHIFT,
            self.z << CELL_SHIFT,
        )
    }

    /// World y of this cell's vertical center.
    #[must_use]
    pub const fn center_y(self) -> i32 {
        (self.y << CELL_SHIFT) + CELL_SIZE / 2
    }

    /// Returns the key shifted by the given offsets, wrapping at the `i32`
    /// bounds.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }

    /// Returns the key shifted by the given offsets, or `None` if any axis
    /// leaves the `i32` range.
    #[must_use]
    pub const fn checked_offset(self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        match (
            self.x.checked_add(dx),
            self.y.checked_add(dy),
            self.z.checked_add(dz),
        ) {
            (Some(x), Some(y), Some(z)) => Some(Self { x, y, z }),
            _ => None,
        }
    }

    /// The keys of the 3×3×3 cube around this one, excluding itself.
    ///
    /// There are 26 of them except at the edge of the coordinate range, where
    /// keys that would fall outside it are skipped.
    pub fn neighbors(self) -> impl Iterator<Item = Self> {
        (-1..=1).flat_map(move |dx| {
            (-1..=1).flat_map(move |dy| {
                (-1..=1).filter_map(move |dz| {
                    if dx == 0 && dy == 0 && dz == 0 {
                        None
                    } else {
                        self.checked_offset(dx, dy, dz)
                    }
                })
            })
        })
    }

    /// Whether `other` is one of this key's [`neighbors`](Self::neighbors).
    #[must_use]
    pub const fn is_neighbor(self, other: Self) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        dx <= 1 && dy <= 1 && dz <= 1 && dx + dy + dz > 0
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
