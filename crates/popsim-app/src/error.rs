use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use popsim_core::ConfigError;
use popsim_sim::{BuildError, ResolutionError, SimulationError, TickError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error("{path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("{path}: {source}")]
    Config { path: PathBuf, source: ConfigError },
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("simulation stopped: {0}")]
    Tick(Arc<TickError>),
}
