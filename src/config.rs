//! Top-level configuration.
//!
//! Each component owns its typed config struct with documented defaults;
//! this module aggregates them into one `Config` loadable from YAML.
//! A missing file means defaults; a malformed file is an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::compose::CompositionConfig;
use crate::duel::{DuelConfig, HedgePolicy};
use crate::entropy::{EntropyEngine, EntropyLevel};
use crate::error::Result;
use crate::evolve::EvolutionConfig;
use crate::fitness::FitnessConfig;
use crate::judge::RetryPolicy;

/// Entropy run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Fixed seed for reproducible runs; derived from ambient sources
    /// when absent.
    pub seed: Option<u64>,
    pub level: EntropyLevel,
}

impl EntropyConfig {
    /// Build the engine this configuration describes.
    pub fn build(&self) -> EntropyEngine {
        EntropyEngine::new(self.seed, self.level)
    }
}

/// Aggregated configuration for a full run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub entropy: EntropyConfig,
    pub composition: CompositionConfig,
    pub fitness: FitnessConfig,
    pub evolution: EvolutionConfig,
    pub duel: DuelConfig,
    pub hedge: HedgePolicy,
    pub retry: RetryPolicy,
}

impl Config {
    /// Load from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        log::info!("loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Load from a YAML file if it exists, defaults otherwise. A file
    /// that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            log::info!("no config file found, using defaults");
            Ok(Self::default())
        }
    }
}
