//! Terrain access for one cell.
//!
//! The engine owns block storage; the sampler only sees it through
//! [`CellHandle`]. [`VoxelCell`] is a self-contained implementation backed by a
//! flat array, used by tests, benchmarks and the demo world.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use wellspring_utils::{CELL_SIZE, CellKey};

/// What a sampled voxel contributes to the water tallies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum VoxelClass {
    /// Anything that is not water.
    #[default]
    None,
    /// Fresh water.
    FreshWater,
    /// Salt water. Also counts towards the fresh tally.
    SaltWater,
    /// Boiling water from hot springs.
    BoilingWater,
}

/// Read access to the terrain of one cell.
///
/// Voxel coordinates are local to the cell, each in `0..CELL_SIZE`.
pub trait CellHandle: Send + Sync {
    /// Whether the cell is loaded, not disposed, and has block data.
    fn is_valid(&self) -> bool;
    /// Ambient rainfall at the cell's center, nominally in `[0, 1]`.
    fn climate_rain_factor(&self) -> f64;
    /// Classifies the voxel at the given local position.
    fn classify_voxel(&self, x: i32, y: i32, z: i32) -> VoxelClass;
    /// World y of the cell's vertical center.
    fn center_elevation(&self) -> i32;
    /// Height of the world in blocks.
    fn world_height(&self) -> i32;
    /// The world seed.
    fn world_seed(&self) -> i64;
}

/// A shared, type-erased cell handle.
pub type SharedCellHandle = Arc<dyn CellHandle>;

/// World-wide properties every cell reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldInfo {
    /// The world seed.
    pub seed: i64,
    /// World height in blocks.
    pub height: i32,
}

impl WorldInfo {
    /// Creates world info.
    #[must_use]
    pub const fn new(seed: i64, height: i32) -> Self {
        Self { seed, height }
    }
}

const VOXELS_PER_CELL: usize = (CELL_SIZE * CELL_SIZE * CELL_SIZE) as usize;

#[inline]
const fn voxel_index(x: i32, y: i32, z: i32) -> usize {
    ((y * CELL_SIZE + z) * CELL_SIZE + x) as usize
}

/// A cell backed by an in-memory voxel array.
pub struct VoxelCell {
    key: CellKey,
    world: WorldInfo,
    rain: f64,
    voxels: Box<[VoxelClass]>,
    loaded: AtomicBool,
}

impl VoxelCell {
    /// Creates a loaded cell with no water.
    #[must_use]
    pub fn new(key: CellKey, world: WorldInfo) -> Self {
        Self {
            key,
            world,
            rain: 0.5,
            voxels: vec![VoxelClass::None; VOXELS_PER_CELL].into_boxed_slice(),
            loaded: AtomicBool::new(true),
        }
    }

    /// Creates a cell whose block data has not arrived yet.
    #[must_use]
    pub fn without_data(key: CellKey, world: WorldInfo) -> Self {
        Self {
            voxels: Box::new([]),
            ..Self::new(key, world)
        }
    }

    /// Sets the ambient rainfall.
    #[must_use]
    pub const fn with_rain(mut self, rain: f64) -> Self {
        self.rain = rain;
        self
    }

    /// The cell's key.
    #[must_use]
    pub const fn key(&self) -> CellKey {
        self.key
    }

    /// Sets one voxel. Out-of-range positions and data-less cells are ignored.
    pub fn set(&mut self, x: i32, y: i32, z: i32, class: VoxelClass) {
        if !(0..CELL_SIZE).contains(&x) || !(0..CELL_SIZE).contains(&y) || !(0..CELL_SIZE).contains(&z)
        {
            return;
        }
        if let Some(voxel) = self.voxels.get_mut(voxel_index(x, y, z)) {
            *voxel = class;
        }
    }

    /// Fills the local layers `y_min..y_max` entirely with `class`.
    pub fn fill_layers(&mut self, y_min: i32, y_max: i32, class: VoxelClass) {
        for y in y_min.max(0)..y_max.min(CELL_SIZE) {
            for z in 0..CELL_SIZE {
                for x in 0..CELL_SIZE {
                    self.set(x, y, z, class);
                }
            }
        }
    }

    /// Fills the whole cell with `class`.
    pub fn fill(&mut self, class: VoxelClass) {
        self.voxels.fill(class);
    }

    /// Marks the cell as unloaded.
    pub fn unload(&self) {
        self.loaded.store(false, Ordering::Release);
    }

    /// Marks the cell as loaded again.
    pub fn reload(&self) {
        self.loaded.store(true, Ordering::Release);
    }
}

impl CellHandle for VoxelCell {
    fn is_valid(&self) -> bool {
        self.loaded.load(Ordering::Acquire) && !self.voxels.is_empty()
    }

    fn climate_rain_factor(&self) -> f64 {
        self.rain
    }

    fn classify_voxel(&self, x: i32, y: i32, z: i32) -> VoxelClass {
        if !(0..CELL_SIZE).contains(&x) || !(0..CELL_SIZE).contains(&y) || !(0..CELL_SIZE).contains(&z)
        {
            return VoxelClass::None;
        }
        self.voxels
            .get(voxel_index(x, y, z))
            .copied()
            .unwrap_or_default()
    }

    fn center_elevation(&self) -> i32 {
        self.key.center_y()
    }

    fn world_height(&self) -> i32 {
        self.world.height
    }

    fn world_seed(&self) -> i64 {
        self.world.seed
    }
}
