//! Raw aquifer rating from a cell's own terrain.
//!
//! Sampling runs in two stages:
//!
//! 1. **Scan**: every `stride`-th voxel is classified into the fresh, salt and
//!    boiling tallies. The scan is split along the x axis across the worker
//!    pool; each partition counts privately and merges once at the end. The
//!    counts are then scaled up to estimated blocks, so the stride changes
//!    the precision of a rating but not its magnitude.
//! 2. **Score**: each tally goes through its own diminishing-returns curve,
//!    the weighted sum is scaled by rainfall and normalized against a ceiling
//!    that grows with world height. Elevation then caps surface cells or
//!    makes deep cells more likely to roll the anomaly bonus.
//!
//! All randomness comes from the cell's own stream, so a cell scores the same
//! no matter when or how often it is sampled.

use rayon::prelude::*;
use wellspring_utils::locks::SyncMutex;
use wellspring_utils::math::{map_clamped, safe_div};
use wellspring_utils::random::{Random, cell_random};
use wellspring_utils::{CELL_SIZE, CellKey};

use crate::config::SamplerConfig;
use crate::error::AquiferError;
use crate::rating::{MAX_RATING, Rating};
use crate::terrain::{CellHandle, VoxelClass};

/// Salt that selects the scoring stream of a cell.
pub(crate) const SCORE_STREAM: u64 = 0;

/// Rainfall is remapped from `[0, 1]` into this multiplier range.
const RAIN_MULTIPLIER_MIN: f64 = 0.75;
const RAIN_MULTIPLIER_MAX: f64 = 1.75;

const ANOMALY_BONUS_MIN: i32 = 1;
const ANOMALY_BONUS_MAX: i32 = 10;
const ANOMALY_FACTOR_MIN: f64 = 1.1;
const ANOMALY_FACTOR_MAX: f64 = 10.0;

/// Water counts found by a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaterTally {
    /// Fresh water voxels, including salt water.
    pub fresh: u64,
    /// Salt water voxels.
    pub salt: u64,
    /// Boiling water voxels.
    pub boiling: u64,
}

impl WaterTally {
    /// Counts one voxel.
    #[inline]
    pub const fn record(&mut self, class: VoxelClass) {
        match class {
            VoxelClass::None => {}
            VoxelClass::FreshWater => self.fresh += 1,
            VoxelClass::SaltWater => {
                self.salt += 1;
                self.fresh += 1;
            }
            VoxelClass::BoilingWater => self.boiling += 1,
        }
    }

    /// Adds another tally into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.fresh += other.fresh;
        self.salt += other.salt;
        self.boiling += other.boiling;
    }

    /// Whether no water was found at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fresh == 0 && self.salt == 0 && self.boiling == 0
    }

    /// Multiplies every count by `factor`, rounding to whole blocks.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |count: u64| (count as f64 * factor).round() as u64;
        Self {
            fresh: scale(self.fresh),
            salt: scale(self.salt),
            boiling: scale(self.boiling),
        }
    }

    /// Salty when salt water makes up more than half the fresh tally.
    #[must_use]
    pub fn is_salty(&self) -> bool {
        self.salt as f64 > 0.5 * self.fresh as f64
    }
}

/// The non-voxel inputs of the scoring step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreInputs {
    /// Ambient rainfall, nominally `[0, 1]`.
    pub rain_factor: f64,
    /// World y of the cell's vertical center.
    pub center_elevation: i32,
    /// World height in blocks.
    pub world_height: i32,
}

impl ScoreInputs {
    /// Reads the inputs from a cell handle.
    #[must_use]
    pub fn from_handle(handle: &dyn CellHandle) -> Self {
        Self {
            rain_factor: handle.climate_rain_factor(),
            center_elevation: handle.center_elevation(),
            world_height: handle.world_height(),
        }
    }
}

/// Computes raw ratings. Stateless apart from its configuration.
#[derive(Clone, Debug)]
pub struct AquiferSampler {
    config: SamplerConfig,
}

impl AquiferSampler {
    /// Creates a sampler.
    #[must_use]
    pub const fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    /// The sampler's configuration.
    #[must_use]
    pub const fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Samples the raw rating of a cell.
    ///
    /// Fails with [`AquiferError::CellUnavailable`] if the handle is not
    /// valid; never returns a silent default for missing terrain.
    pub fn sample(&self, handle: &dyn CellHandle, key: CellKey) -> Result<Rating, AquiferError> {
        if !handle.is_valid() {
            return Err(AquiferError::CellUnavailable(key));
        }

        let mut random = cell_random(handle.world_seed(), key, SCORE_STREAM);
        let tally = self.scan(handle).scaled(self.blocks_per_sample());
        Ok(self.score(&tally, &ScoreInputs::from_handle(handle), &mut random))
    }

    fn stride(&self) -> usize {
        self.config.stride.clamp(1, CELL_SIZE as u32) as usize
    }

    /// How many blocks of the cell one sampled voxel stands for.
    #[must_use]
    pub fn blocks_per_sample(&self) -> f64 {
        let per_axis = (CELL_SIZE as usize).div_ceil(self.stride());
        (f64::from(CELL_SIZE) / per_axis as f64).powi(3)
    }

    /// Tallies the sampled voxels of a cell.
    ///
    /// Counts are in sampled voxels, not blocks; see
    /// [`blocks_per_sample`](Self::blocks_per_sample). Runs on the current
    /// rayon pool, one task per sampled x slice.
    #[must_use]
    pub fn scan(&self, handle: &dyn CellHandle) -> WaterTally {
        let stride = self.stride();
        let total = SyncMutex::new(WaterTally::default());

        (0..CELL_SIZE)
            .into_par_iter()
            .step_by(stride)
            .for_each(|x| {
                let mut slice = WaterTally::default();
                for y in (0..CELL_SIZE).step_by(stride) {
                    for z in (0..CELL_SIZE).step_by(stride) {
                        slice.record(handle.classify_voxel(x, y, z));
                    }
                }
                total.lock().merge(&slice);
            });

        total.into_inner()
    }

    /// The combined score that maps to a rating of 100 in a world of the
    /// given height.
    #[must_use]
    pub fn ceiling(&self, world_height: i32) -> f64 {
        let baseline =
            (f64::from(world_height.max(0)) * self.config.baseline_blocks_per_height).round();
        self.config.fresh_curve.evaluate(baseline as u64) * self.config.weights.fresh
    }

    /// World y of sea level.
    #[must_use]
    pub fn sea_level(&self, world_height: i32) -> i32 {
        (f64::from(world_height) * self.config.sea_level_ratio).round() as i32
    }

    /// Turns a tally of blocks into a rating.
    pub fn score(
        &self,
        tally: &WaterTally,
        inputs: &ScoreInputs,
        random: &mut impl Random,
    ) -> Rating {
        let is_salty = tally.is_salty();
        if tally.is_empty() || !inputs.rain_factor.is_finite() {
            return Rating::new(0, is_salty);
        }

        let config = &self.config;
        let weighted = config.fresh_curve.evaluate(tally.fresh) * config.weights.fresh
            + config.salt_curve.evaluate(tally.salt) * config.weights.salt
            + config.boiling_curve.evaluate(tally.boiling) * config.weights.boiling;
        let rain = map_clamped(
            inputs.rain_factor,
            0.0,
            1.0,
            RAIN_MULTIPLIER_MIN,
            RAIN_MULTIPLIER_MAX,
        );

        let max = f64::from(MAX_RATING);
        let mut rating =
            (safe_div(weighted * rain, self.ceiling(inputs.world_height)) * max).clamp(0.0, max);

        let sea_level = self.sea_level(inputs.world_height);
        let above_sea = inputs.center_elevation > sea_level;
        let depth_multiplier = if above_sea {
            1.0
        } else {
            let depth = f64::from(sea_level - inputs.center_elevation);
            1.0 + safe_div(depth, f64::from(sea_level)) * config.depth_chance_scale
        };

        if random.chance(config.anomaly_chance * depth_multiplier) {
            let bonus = random.next_i32_between_inclusive(ANOMALY_BONUS_MIN, ANOMALY_BONUS_MAX);
            let factor = random.next_f64_between(ANOMALY_FACTOR_MIN, ANOMALY_FACTOR_MAX);
            rating = ((rating + f64::from(bonus)) * factor).clamp(0.0, max);
        }

        if above_sea {
            rating = rating.min(f64::from(config.surface_ceiling));
        }

        Rating::from_score(rating, is_salty)
    }
}

#[cfg(test)]
mod tests {
    use wellspring_utils::random::xoroshiro::Xoroshiro;

    use super::*;
    use crate::terrain::{VoxelCell, WorldInfo};

    const WORLD: WorldInfo = WorldInfo::new(8_675_309, 256);

    fn sampler() -> AquiferSampler {
        AquiferSampler::new(SamplerConfig::default())
    }

    fn deep_inputs() -> ScoreInputs {
        ScoreInputs {
            rain_factor: 0.5,
            center_elevation: 40,
            world_height: 256,
        }
    }

    #[test]
    fn salt_counts_as_fresh() {
        let mut tally = WaterTally::default();
        tally.record(VoxelClass::SaltWater);
        tally.record(VoxelClass::FreshWater);
        tally.record(VoxelClass::BoilingWater);
        tally.record(VoxelClass::None);
        assert_eq!(
            tally,
            WaterTally {
                fresh: 2,
                salt: 1,
                boiling: 1
            }
        );
    }

    #[test]
    fn saltiness_threshold() {
        let salty = |salt, fresh| {
            WaterTally {
                fresh,
                salt,
                boiling: 0,
            }
            .is_salty()
        };
        assert!(!salty(100, 100 * 2));
        assert!(salty(101, 100 * 2));
        assert!(!salty(50, 100));
        assert!(salty(100, 100));
        assert!(!salty(0, 0));
    }

    #[test]
    fn no_water_scores_zero() {
        let mut random = Xoroshiro::from_seed(1);
        let rating = sampler().score(&WaterTally::default(), &deep_inputs(), &mut random);
        assert_eq!(rating, Rating::ZERO);
    }

    #[test]
    fn non_finite_rain_scores_zero() {
        let tally = WaterTally {
            fresh: 40,
            salt: 0,
            boiling: 0,
        };
        for rain in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let inputs = ScoreInputs {
                rain_factor: rain,
                ..deep_inputs()
            };
            let rating = sampler().score(&tally, &inputs, &mut Xoroshiro::from_seed(3));
            assert_eq!(rating.value, 0);
        }
    }

    #[test]
    fn zero_height_world_does_not_divide_by_zero() {
        let tally = WaterTally {
            fresh: 40,
            salt: 0,
            boiling: 0,
        };
        let inputs = ScoreInputs {
            world_height: 0,
            ..deep_inputs()
        };
        let rating = sampler().score(&tally, &inputs, &mut Xoroshiro::from_seed(3));
        assert!(rating.value <= 100);
    }

    #[test]
    fn more_rain_never_lowers_score() {
        let mut config = SamplerConfig::default();
        config.anomaly_chance = 0.0;
        let sampler = AquiferSampler::new(config);
        let tally = WaterTally {
            fresh: 12,
            salt: 0,
            boiling: 0,
        };
        let dry = ScoreInputs {
            rain_factor: 0.0,
            ..deep_inputs()
        };
        let wet = ScoreInputs {
            rain_factor: 1.0,
            ..deep_inputs()
        };
        let mut random = Xoroshiro::from_seed(0);
        assert!(
            sampler.score(&tally, &wet, &mut random).value
                > sampler.score(&tally, &dry, &mut random).value
        );
    }

    #[test]
    fn surface_cells_are_capped() {
        let mut config = SamplerConfig::default();
        config.anomaly_chance = 1.0;
        let sampler = AquiferSampler::new(config);
        let tally = WaterTally {
            fresh: 512,
            salt: 0,
            boiling: 512,
        };
        let inputs = ScoreInputs {
            rain_factor: 1.0,
            center_elevation: 200,
            world_height: 256,
        };
        for seed in 0..64 {
            let rating = sampler.score(&tally, &inputs, &mut Xoroshiro::from_seed(seed));
            assert!(rating.value <= 20, "seed {seed} gave {}", rating.value);
        }
    }

    #[test]
    fn anomaly_raises_rating() {
        let tally = WaterTally {
            fresh: 6,
            salt: 0,
            boiling: 0,
        };
        let mut calm = SamplerConfig::default();
        calm.anomaly_chance = 0.0;
        let mut wild = SamplerConfig::default();
        wild.anomaly_chance = 1.0;

        let base = AquiferSampler::new(calm).score(&tally, &deep_inputs(), &mut Xoroshiro::from_seed(9));
        let boosted =
            AquiferSampler::new(wild).score(&tally, &deep_inputs(), &mut Xoroshiro::from_seed(9));
        assert!(boosted.value > base.value);
    }

    #[test]
    fn full_scan_counts_every_stride_point() {
        let mut cell = VoxelCell::new(CellKey::new(0, 1, 0), WORLD);
        cell.fill(VoxelClass::FreshWater);
        let tally = sampler().scan(&cell);
        assert_eq!(tally.fresh, 8 * 8 * 8);

        let mut config = SamplerConfig::default();
        config.stride = 1;
        assert_eq!(AquiferSampler::new(config).scan(&cell).fresh, 16 * 16 * 16);
    }

    fn calm_sampler(stride: u32) -> AquiferSampler {
        AquiferSampler::new(SamplerConfig {
            stride,
            anomaly_chance: 0.0,
            ..SamplerConfig::default()
        })
    }

    #[test]
    fn blocks_per_sample_covers_the_cell() {
        for (stride, blocks) in [(1, 1.0), (2, 8.0), (4, 64.0), (16, 4096.0)] {
            assert!((calm_sampler(stride).blocks_per_sample() - blocks).abs() < 1e-9);
        }
        // 16 / 3 rounds up to 6 samples per axis.
        let expected = (16.0_f64 / 6.0).powi(3);
        assert!((calm_sampler(3).blocks_per_sample() - expected).abs() < 1e-9);
    }

    #[test]
    fn stride_does_not_change_rating() {
        let key = CellKey::new(1, 2, 3);
        let mut cell = VoxelCell::new(key, WORLD).with_rain(0.7);
        cell.fill_layers(0, 8, VoxelClass::FreshWater);
        cell.fill_layers(8, 12, VoxelClass::SaltWater);

        let reference = calm_sampler(1).sample(&cell, key).unwrap();
        for stride in [2, 4] {
            let rating = calm_sampler(stride).sample(&cell, key).unwrap();
            assert!(
                rating.value.abs_diff(reference.value) <= 1,
                "stride {stride} gave {} against {}",
                rating.value,
                reference.value
            );
            assert_eq!(rating.is_salty, reference.is_salty);
        }
    }

    #[test]
    fn thin_water_layer_is_far_from_full() {
        let key = CellKey::new(0, 2, 0);
        let mut thin = VoxelCell::new(key, WORLD);
        thin.fill_layers(0, 1, VoxelClass::FreshWater);
        let mut flooded = VoxelCell::new(key, WORLD);
        flooded.fill(VoxelClass::FreshWater);

        for stride in [1, 2] {
            let sampler = calm_sampler(stride);
            let thin = sampler.sample(&thin, key).unwrap().value;
            assert!(thin < 30, "stride {stride}: one layer rated {thin}");
            assert_eq!(sampler.sample(&flooded, key).unwrap().value, 100);
        }
    }

    #[test]
    fn sampling_is_deterministic() {
        let key = CellKey::new(-4, 2, 11);
        let mut cell = VoxelCell::new(key, WORLD).with_rain(0.8);
        cell.fill_layers(0, 5, VoxelClass::FreshWater);
        cell.fill_layers(5, 7, VoxelClass::SaltWater);
        cell.set(3, 12, 3, VoxelClass::BoilingWater);

        let sampler = sampler();
        let first = sampler.sample(&cell, key).unwrap();
        for _ in 0..8 {
            assert_eq!(sampler.sample(&cell, key).unwrap(), first);
        }
    }

    #[test]
    fn invalid_cell_is_unavailable() {
        let key = CellKey::new(0, 0, 0);
        let cell = VoxelCell::without_data(key, WORLD);
        assert_eq!(
            sampler().sample(&cell, key),
            Err(AquiferError::CellUnavailable(key))
        );
    }

    #[test]
    fn ratings_stay_in_bounds_for_extreme_cells() {
        let sampler = AquiferSampler::new(SamplerConfig {
            anomaly_chance: 1.0,
            ..SamplerConfig::default()
        });
        for (index, class) in [
            VoxelClass::FreshWater,
            VoxelClass::SaltWater,
            VoxelClass::BoilingWater,
        ]
        .into_iter()
        .enumerate()
        {
            for rain in [0.0, 1.0, 1e9, -1e9] {
                let key = CellKey::new(index as i32, 0, 0);
                let mut cell = VoxelCell::new(key, WORLD).with_rain(rain);
                cell.fill(class);
                let rating = sampler.sample(&cell, key).unwrap();
                assert!(rating.value <= 100);
            }
        }
    }
}
