//! A small synthetic world to drive the aquifer service with.
//!
//! Columns of cells with a salty band just under sea level, scattered fresh
//! water below it and hot springs near bedrock. One column never receives
//! block data, so its cells exercise the failure path.

use std::sync::Arc;

use wellspring_core::{AquiferService, VoxelCell, VoxelClass, WorldInfo};
use wellspring_utils::random::{Random, cell_random};
use wellspring_utils::{BlockPos, CELL_SIZE, CellKey};

use crate::config::DemoConfig;

const TERRAIN_STREAM: u64 = 0x7e77_a100;
const SPRING_STREAM: u64 = 0x5971_0000;

const SALT_BAND: i32 = 8;
const HOT_SPRING_DEPTH: i32 = 24;

/// The generated cells and the wellsprings placed in them.
pub struct DemoWorld {
    cells: Vec<Arc<VoxelCell>>,
    springs: Vec<(BlockPos, f64)>,
}

impl DemoWorld {
    /// Generates a world deterministically from `seed`.
    #[must_use]
    pub fn generate(seed: i64, config: &DemoConfig) -> Self {
        let info = WorldInfo::new(seed, config.world_height);
        let sea_level = (f64::from(config.world_height) * 0.43).round() as i32;
        let layers = (config.world_height / CELL_SIZE).max(1);
        let radius = config.radius.max(0);

        let mut cells = Vec::new();
        let mut springs = Vec::new();

        for cx in -radius..=radius {
            for cz in -radius..=radius {
                for cy in 0..layers {
                    let key = CellKey::new(cx, cy, cz);
                    cells.push(Arc::new(generate_cell(key, info, sea_level)));
                }

                let mut random = cell_random(seed, CellKey::new(cx, 0, cz), SPRING_STREAM);
                let spring_y = random.next_i32_between_inclusive(HOT_SPRING_DEPTH, sea_level);
                let origin = CellKey::new(cx, 0, cz).min_block();
                springs.push((
                    BlockPos::new(origin.0.x + 8, spring_y, origin.0.z + 8),
                    random.next_f64(),
                ));
            }
        }

        // Three springs sharing one cell compete for its budget.
        let shared = CellKey::new(0, 3, 0).min_block();
        for (offset, depth_factor) in [(1, 0.8), (5, 0.5), (9, 0.2)] {
            springs.push((
                BlockPos::new(shared.0.x + offset, shared.0.y + 4, shared.0.z + offset),
                depth_factor,
            ));
        }

        for cy in 0..layers {
            let key = CellKey::new(radius + 1, cy, 0);
            cells.push(Arc::new(VoxelCell::without_data(key, info)));
        }

        Self { cells, springs }
    }

    /// Loads every cell and registers every wellspring.
    pub fn load_into(&self, service: &AquiferService) {
        for cell in &self.cells {
            service.on_region_loaded(cell.key(), cell.clone());
        }
        for &(position, depth_factor) in &self.springs {
            service.register_wellspring(position, depth_factor);
        }
        log::info!(
            "Loaded {} demo cells with {} wellsprings",
            self.cells.len(),
            self.springs.len()
        );
    }

    /// Logs ratings and this tick's wellspring output.
    pub fn report(&self, service: &AquiferService) {
        let rated = self
            .cells
            .iter()
            .filter(|cell| service.get_rating(cell.key()).is_some())
            .count();
        log::info!("{rated} of {} cells have a rating", self.cells.len());

        let mut keys: Vec<CellKey> = self.springs.iter().map(|(pos, _)| pos.cell()).collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            let rating = service.get_rating(key);
            for allocation in service.allocate(key) {
                log::info!(
                    "Cell {key} rating {:?}: wellspring at {} (depth {:.2}) emits {:.2}",
                    rating.map(|r| r.value),
                    allocation.position,
                    allocation.depth_factor,
                    allocation.amount
                );
            }
        }

        let stats = service.stats();
        tracing::info!(
            sampled = stats.sampled,
            smoothed = stats.smoothed,
            unavailable = stats.sample_failures,
            deferred = stats.smooth_deferrals,
            requeued = stats.requeued,
            dropped = stats.dropped,
            "Aquifer statistics"
        );
    }
}

fn generate_cell(key: CellKey, info: WorldInfo, sea_level: i32) -> VoxelCell {
    let mut random = cell_random(info.seed, key, TERRAIN_STREAM);
    let mut cell = VoxelCell::new(key, info).with_rain(random.next_f64());
    let base_y = key.min_block().0.y;

    for local_y in 0..CELL_SIZE {
        let world_y = base_y + local_y;
        for local_z in 0..CELL_SIZE {
            for local_x in 0..CELL_SIZE {
                let class = if world_y >= sea_level {
                    VoxelClass::None
                } else if world_y >= sea_level - SALT_BAND {
                    if random.chance(0.6) {
                        VoxelClass::SaltWater
                    } else {
                        VoxelClass::FreshWater
                    }
                } else if world_y < HOT_SPRING_DEPTH {
                    if random.chance(0.1) {
                        VoxelClass::BoilingWater
                    } else {
                        VoxelClass::None
                    }
                } else if random.chance(0.2) {
                    VoxelClass::FreshWater
                } else {
                    VoxelClass::None
                };
                cell.set(local_x, local_y, local_z, class);
            }
        }
    }
    cell
}
