//! Engine error taxonomy.

use std::any::Any;
use std::io;

use thiserror::Error;

use popsim_core::ConfigError;

use crate::entity::EntityId;
use crate::script::{ResolutionError, ScriptError};

/// Failure while constructing a world or its pipeline. Always fatal and
/// always raised before the first tick.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("failed to build update worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("failed to spawn {name} thread: {source}")]
    Thread { name: &'static str, source: io::Error },
}

/// Failure inside a tick. The tick is abandoned and the driver shuts down.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("init of {entity} failed: {source}")]
    Init { entity: EntityId, source: ScriptError },
    #[error("behavior slot {slot} of {entity} failed: {source}")]
    Behavior {
        entity: EntityId,
        slot: usize,
        source: ScriptError,
    },
    #[error("render slot {slot} of {entity} failed: {source}")]
    Render {
        entity: EntityId,
        slot: usize,
        source: ScriptError,
    },
    #[error("finalize of behavior slot {slot} of {entity} failed: {source}")]
    Finalize {
        entity: EntityId,
        slot: usize,
        source: ScriptError,
    },
    #[error("periodic script {script:?} failed: {source}")]
    Periodic { script: String, source: ScriptError },
    #[error("script panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("simulation already started")]
    AlreadyStarted,
    #[error("simulation not started")]
    NotStarted,
    #[error("simulation terminated")]
    Terminated,
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("world initialization failed: {0}")]
    Init(#[from] TickError),
    #[error("failed to spawn tick scheduler thread: {0}")]
    Thread(io::Error),
    #[error("tick scheduler thread panicked")]
    TickerPanicked,
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
