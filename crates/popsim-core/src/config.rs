//! Simulation configuration.
//!
//! Format-agnostic at this layer: the structs derive serde so an outer layer
//! can load them from JSON, but nothing here touches the filesystem.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_TICK_FREQUENCY, DEFAULT_WORLD_SIZE, NANOS_PER_SECOND};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tick frequency must be greater than zero")]
    ZeroTickFrequency,
    #[error("world dimensions must be positive, got {width}x{height}")]
    InvalidWorldSize { width: u32, height: u32 },
    #[error("periodic script {script:?} has a zero period")]
    ZeroPeriod { script: String },
    #[error("data value under {key:?} cannot be represented")]
    UnsupportedDataValue { key: String },
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Descriptor for one kind of entity: which scripts it runs and the default
/// contents of its private data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityTypeConfig {
    pub behavior_scripts: Vec<String>,
    pub render_scripts: Vec<String>,
    pub data: BTreeMap<String, serde_json::Value>,
}

/// A world-level script fired every `period` ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodicConfig {
    pub script: String,
    pub period: u64,
    /// Ticks before the first run. Defaults to `period`.
    #[serde(default)]
    pub delay: Option<u64>,
}

/// Initial population of the world, selected once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorldLayout {
    #[default]
    Empty,
    /// `count` entities stacked on one point (the world center by default).
    Cluster {
        entity_type: String,
        count: usize,
        #[serde(default)]
        at: Option<[f64; 2]>,
    },
    /// `count` entities at uniformly random positions.
    Scatter { entity_type: String, count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Ticks per second.
    pub tick_frequency: u32,
    /// Empty for wall-clock, an integer literal, or any string to hash.
    pub random_seed: String,
    /// `[width, height]` in world units.
    pub world_size: [u32; 2],
    /// Size of the update worker pool. `None` lets the pool pick.
    pub worker_threads: Option<usize>,
    pub entity_types: BTreeMap<String, EntityTypeConfig>,
    pub periodic_scripts: Vec<PeriodicConfig>,
    pub layout: WorldLayout,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_frequency: DEFAULT_TICK_FREQUENCY,
            random_seed: String::new(),
            world_size: DEFAULT_WORLD_SIZE,
            worker_threads: None,
            entity_types: BTreeMap::new(),
            periodic_scripts: Vec::new(),
            layout: WorldLayout::Empty,
        }
    }
}

impl SimConfig {
    /// Check every value that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_frequency == 0 {
            return Err(ConfigError::ZeroTickFrequency);
        }
        let [width, height] = self.world_size;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidWorldSize { width, height });
        }
        if let Some(p) = self.periodic_scripts.iter().find(|p| p.period == 0) {
            return Err(ConfigError::ZeroPeriod {
                script: p.script.clone(),
            });
        }
        Ok(())
    }

    /// Real-time period between ticks.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        if self.tick_frequency == 0 {
            return Err(ConfigError::ZeroTickFrequency);
        }
        Ok(Duration::from_nanos(
            NANOS_PER_SECOND / self.tick_frequency as u64,
        ))
    }

    /// Simulated seconds per tick.
    pub fn timestep(&self) -> f64 {
        1.0 / self.tick_frequency.max(1) as f64
    }

    pub fn width(&self) -> u32 {
        self.world_size[0]
    }

    pub fn height(&self) -> u32 {
        self.world_size[1]
    }

    /// Resolved RNG seed. See [`parse_seed`].
    pub fn seed(&self) -> u64 {
        parse_seed(&self.random_seed)
    }
}

/// Turn a seed string into a seed.
///
/// Only the empty string means wall-clock milliseconds. A signed 64-bit
/// integer literal is used as-is (negative values keep their two's-complement
/// bits). Anything else, including padded numbers, blank text and values
/// past `i64::MAX`, is hashed with FNV-1a so the same text always gives the
/// same world.
pub fn parse_seed(seed: &str) -> u64 {
    if seed.is_empty() {
        return SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
    }
    if let Ok(n) = seed.parse::<i64>() {
        return n as u64;
    }
    fnv1a(seed.as_bytes())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}
