//! JSON configuration file loading.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use popsim_core::config::{EntityTypeConfig, PeriodicConfig, WorldLayout};
use popsim_core::{ConfigError, SimConfig};

use crate::error::AppError;

/// Load and validate `path`, writing [`demo_config`] there first if the file
/// does not exist.
pub fn load_or_init(path: &Path) -> Result<SimConfig, AppError> {
    if !path.exists() {
        log::info!("{} not found; writing demo configuration", path.display());
        write_config(path, &demo_config())?;
    }
    load(path)
}

pub fn load(path: &Path) -> Result<SimConfig, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_owned(),
        source,
    })?;
    let config_error = |source: ConfigError| AppError::Config {
        path: path.to_owned(),
        source,
    };
    let config: SimConfig =
        serde_json::from_str(&text).map_err(|e| config_error(ConfigError::Json(e)))?;
    config.validate().map_err(config_error)?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &SimConfig) -> Result<(), AppError> {
    let io_error = |source: io::Error| AppError::Io {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|e| AppError::Config {
        path: path.to_owned(),
        source: ConfigError::Json(e),
    })?;
    fs::write(path, json + "\n").map_err(io_error)
}

/// A small repulsion demo: fifty particles released from the world center.
pub fn demo_config() -> SimConfig {
    let particle = EntityTypeConfig {
        behavior_scripts: vec!["repel".into()],
        render_scripts: vec!["dot".into()],
        data: BTreeMap::from([
            ("size".to_string(), serde_json::json!(1.5)),
            ("color".to_string(), serde_json::json!("#ffffff")),
        ]),
    };
    SimConfig {
        entity_types: BTreeMap::from([("particle".to_string(), particle)]),
        periodic_scripts: vec![PeriodicConfig {
            script: "census".into(),
            period: 60,
            delay: None,
        }],
        layout: WorldLayout::Cluster {
            entity_type: "particle".into(),
            count: 50,
            at: None,
        },
        ..SimConfig::default()
    }
}
