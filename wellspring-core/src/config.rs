//! Tunables for sampling, smoothing and scheduling.
//!
//! The subsystem never reads files itself; the host deserializes an
//! [`AquiferConfig`] however it likes and hands it to the service. Every level
//! is `#[serde(default)]`, so a config only needs to name what it overrides.

use std::num::NonZeroUsize;
use std::thread;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wellspring_utils::math::DiminishingCurve;

/// A configuration value that cannot work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The voxel scan stride must be between 1 and the cell size.
    #[error("sampler stride {0} must be between 1 and 16")]
    InvalidStride(u32),
    /// A diminishing-returns curve has negative or non-finite parameters.
    #[error("{0} curve has negative or non-finite parameters")]
    InvalidCurve(&'static str),
    /// Retry caps must allow at least one attempt.
    #[error("{0} must be at least 1")]
    InvalidAttempts(&'static str),
    /// A ratio or weight is outside its usable range.
    #[error("{name} = {value} is out of range")]
    InvalidRatio {
        /// Name of the offending field.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Top-level aquifer configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AquiferConfig {
    /// Sampler and scoring parameters.
    pub sampler: SamplerConfig,
    /// Queue, retry and tick parameters.
    pub scheduler: SchedulerConfig,
}

impl AquiferConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampler.validate()?;
        self.scheduler.validate()
    }
}

/// Relative weight of each kind of water in the combined score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterWeights {
    /// Weight of fresh water (including salt water, which also counts as fresh).
    pub fresh: f64,
    /// Weight of salt water.
    pub salt: f64,
    /// Weight of boiling water.
    pub boiling: f64,
}

impl Default for WaterWeights {
    fn default() -> Self {
        Self {
            fresh: 1.0,
            salt: 0.5,
            boiling: 2.0,
        }
    }
}

/// Parameters of the per-cell scoring algorithm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Distance in blocks between sampled voxels on every axis.
    pub stride: u32,
    /// Curve applied to the fresh water tally.
    pub fresh_curve: DiminishingCurve,
    /// Curve applied to the salt water tally. Decays faster than fresh.
    pub salt_curve: DiminishingCurve,
    /// Curve applied to the boiling water tally. Decays slower than fresh.
    pub boiling_curve: DiminishingCurve,
    /// Weights used to combine the three curves.
    pub weights: WaterWeights,
    /// Blocks of fresh water per unit of world height that count as a full
    /// rating at neutral rainfall. Taller worlds need proportionally more
    /// water to saturate. At 16 a 256 block world needs one cell (4096
    /// blocks) full of fresh water.
    pub baseline_blocks_per_height: f64,
    /// Sea level as a fraction of world height.
    pub sea_level_ratio: f64,
    /// Highest rating a cell centered above sea level may have.
    pub surface_ceiling: u8,
    /// Base probability of the anomaly bonus.
    pub anomaly_chance: f64,
    /// How strongly depth below sea level raises the anomaly probability.
    pub depth_chance_scale: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            stride: 2,
            fresh_curve: DiminishingCurve::new(1.0, 0.05, 0.1),
            salt_curve: DiminishingCurve::new(1.2, 0.1, 0.25),
            boiling_curve: DiminishingCurve::new(2.0, 0.2, 0.05),
            weights: WaterWeights::default(),
            baseline_blocks_per_height: 16.0,
            sea_level_ratio: 0.43,
            surface_ceiling: 20,
            anomaly_chance: 0.02,
            depth_chance_scale: 3.0,
        }
    }
}

impl SamplerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.stride == 0 || self.stride > 16 {
            return Err(ConfigError::InvalidStride(self.stride));
        }
        for (name, curve) in [
            ("fresh", &self.fresh_curve),
            ("salt", &self.salt_curve),
            ("boiling", &self.boiling_curve),
        ] {
            if !curve.is_valid() {
                return Err(ConfigError::InvalidCurve(name));
            }
        }
        for (name, value) in [
            ("weights.fresh", self.weights.fresh),
            ("weights.salt", self.weights.salt),
            ("weights.boiling", self.weights.boiling),
            ("baseline_blocks_per_height", self.baseline_blocks_per_height),
            ("depth_chance_scale", self.depth_chance_scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }
        for (name, value) in [
            ("sea_level_ratio", self.sea_level_ratio),
            ("anomaly_chance", self.anomaly_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }
        if self.surface_ceiling > 100 {
            return Err(ConfigError::InvalidRatio {
                name: "surface_ceiling",
                value: f64::from(self.surface_ceiling),
            });
        }
        Ok(())
    }
}

/// Parameters of the pending queue, failure table and tick loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Attempts after which a failing cell is dropped.
    pub max_attempts: u32,
    /// Smoothing passes a cell may run while some neighbours are missing.
    pub max_resmooth_passes: u32,
    /// Milliseconds between pending-queue drains.
    pub drain_interval_ms: u64,
    /// Milliseconds between failure-table sweeps.
    pub sweep_interval_ms: u64,
    /// Maximum number of cells claimed by one drain.
    pub drain_batch: usize,
    /// Worker threads for sampling and smoothing. `0` uses all cores.
    pub workers: usize,
    /// A drain slower than this many milliseconds is logged as a warning.
    pub slow_drain_warn_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_resmooth_passes: 8,
            drain_interval_ms: 1_000,
            sweep_interval_ms: 5_000,
            drain_batch: 256,
            workers: 0,
            slow_drain_warn_ms: 250,
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidAttempts("max_attempts"));
        }
        if self.max_resmooth_passes == 0 {
            return Err(ConfigError::InvalidAttempts("max_resmooth_passes"));
        }
        if self.drain_batch == 0 {
            return Err(ConfigError::InvalidAttempts("drain_batch"));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::InvalidAttempts("drain_interval_ms"));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidAttempts("sweep_interval_ms"));
        }
        Ok(())
    }

    /// Number of worker threads to spawn.
    #[must_use]
    pub fn resolved_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AquiferConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AquiferConfig =
            serde_json::from_str(r#"{ "scheduler": { "max_attempts": 3 } }"#).unwrap();
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.scheduler.max_resmooth_passes, 8);
        assert_eq!(config.sampler, SamplerConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = AquiferConfig::default();
        config.sampler.stride = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidStride(0)));

        let mut config = AquiferConfig::default();
        config.sampler.salt_curve.decay = f64::NAN;
        assert_eq!(config.validate(), Err(ConfigError::InvalidCurve("salt")));

        let mut config = AquiferConfig::default();
        config.scheduler.max_attempts = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidAttempts("max_attempts"))
        );

        let mut config = AquiferConfig::default();
        config.sampler.anomaly_chance = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRatio {
                name: "anomaly_chance",
                ..
            })
        ));
    }

    #[test]
    fn explicit_workers_win() {
        let config = SchedulerConfig {
            workers: 3,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.resolved_workers(), 3);
        assert!(SchedulerConfig::default().resolved_workers() >= 1);
    }
}
