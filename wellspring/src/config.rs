//! Host configuration, read from a JSON5 file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use wellspring_core::AquiferConfig;

/// Default location of the config file.
pub const DEFAULT_PATH: &str = "wellspring.json5";

/// Everything the demo host reads at startup.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// World seed. Empty picks a random seed, numbers are used as-is and any
    /// other text is hashed.
    pub seed: String,
    /// Give up waiting for the world to settle after this many seconds.
    pub max_run_seconds: u64,
    /// Shape of the generated demo world.
    pub demo: DemoConfig,
    /// Passed straight to the aquifer service.
    pub aquifer: AquiferConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            seed: String::new(),
            max_run_seconds: 60,
            demo: DemoConfig::default(),
            aquifer: AquiferConfig::default(),
        }
    }
}

/// Shape of the generated demo world.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Columns generated in each horizontal direction around the origin.
    pub radius: i32,
    /// World height in blocks.
    pub world_height: i32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            world_height: 256,
        }
    }
}

impl HostConfig {
    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        serde_json5::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Resolves the seed string into a world seed.
    #[must_use]
    pub fn world_seed(&self) -> i64 {
        if self.seed.is_empty() {
            return rand::random();
        }
        self.seed.parse().unwrap_or_else(|_| {
            let mut hash: i64 = 0;
            for byte in self.seed.bytes() {
                hash = hash.wrapping_mul(31).wrapping_add(i64::from(byte));
            }
            hash
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: HostConfig = serde_json5::from_str(
            r"{
                // only override what matters
                seed: 'aquifers',
                aquifer: { scheduler: { max_attempts: 3 } },
            }",
        )
        .unwrap();
        assert_eq!(config.max_run_seconds, 60);
        assert_eq!(config.demo.radius, 2);
        assert_eq!(config.aquifer.scheduler.max_attempts, 3);
        assert_eq!(config.aquifer.sampler.stride, 2);
    }

    #[test]
    fn seed_resolution() {
        let numeric = HostConfig {
            seed: "-42".to_owned(),
            ..HostConfig::default()
        };
        assert_eq!(numeric.world_seed(), -42);

        let text = HostConfig {
            seed: "ab".to_owned(),
            ..HostConfig::default()
        };
        assert_eq!(text.world_seed(), 97 * 31 + 98);
    }

    #[test]
    fn missing_file_is_default() {
        let config = HostConfig::load(Path::new("does/not/exist.json5")).unwrap();
        assert!(config.seed.is_empty());
    }
}
