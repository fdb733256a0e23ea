//! Plugin contracts and the static script registry.
//!
//! Scripts are registered by name before the world is built. Entity types
//! and periodic entries in the configuration refer to them by that name;
//! every reference is resolved once, in `World::new`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use popsim_core::{Data, DataError, ScheduleError, Surface};

use crate::entity::Entity;
use crate::world::World;

/// Failure raised by a script. Any error aborts the tick it happened in.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("script is not attached to entity type {0:?}")]
    NotAttached(String),
    #[error("{0}")]
    Failed(String),
}

pub type ScriptResult = Result<(), ScriptError>;

/// Per-entity update logic.
///
/// `behave` may read any entity's current and past position, but must write
/// only to its own entity's future position and `data`.
pub trait BehaviorScript: Send + Sync {
    /// Runs once when the entity becomes live.
    fn init(&self, _world: &World, _entity: &Entity, _data: &mut Data) -> ScriptResult {
        Ok(())
    }

    /// Runs when this script's behavior slot fires.
    fn behave(&self, world: &World, entity: &Entity, data: &mut Data) -> ScriptResult;

    /// Runs every tick after all updates, before buffers are promoted.
    fn finalize(&self, _world: &World, _entity: &Entity, _data: &mut Data) -> ScriptResult {
        Ok(())
    }
}

/// Per-entity drawing logic. Runs on the render thread.
pub trait RenderScript: Send + Sync {
    fn init(&self, _world: &World, _entity: &Entity, _data: &mut Data) -> ScriptResult {
        Ok(())
    }

    fn render(
        &self,
        world: &World,
        entity: &Entity,
        data: &mut Data,
        surface: &mut dyn Surface,
    ) -> ScriptResult;
}

/// World-level logic fired on a fixed tick period.
pub trait PeriodicScript: Send + Sync {
    fn init(&self, _world: &World) -> ScriptResult {
        Ok(())
    }

    fn run(&self, world: &World) -> ScriptResult;
}

/// A configuration reference that could not be resolved.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("entity type {entity_type:?} references unknown behavior script {script:?}")]
    UnknownBehaviorScript { entity_type: String, script: String },
    #[error("entity type {entity_type:?} references unknown render script {script:?}")]
    UnknownRenderScript { entity_type: String, script: String },
    #[error("unknown periodic script {0:?}")]
    UnknownPeriodicScript(String),
    #[error("unknown entity type {0:?}")]
    UnknownEntityType(String),
    #[error("script {0:?} registered twice")]
    DuplicateScript(String),
}

/// Name → script table, one namespace per contract.
#[derive(Default, Clone)]
pub struct ScriptRegistry {
    behaviors: HashMap<String, Arc<dyn BehaviorScript>>,
    renders: HashMap<String, Arc<dyn RenderScript>>,
    periodics: HashMap<String, Arc<dyn PeriodicScript>>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_behavior(
        &mut self,
        name: &str,
        script: Arc<dyn BehaviorScript>,
    ) -> Result<(), ResolutionError> {
        insert_unique(&mut self.behaviors, name, script)
    }

    pub fn register_render(
        &mut self,
        name: &str,
        script: Arc<dyn RenderScript>,
    ) -> Result<(), ResolutionError> {
        insert_unique(&mut self.renders, name, script)
    }

    pub fn register_periodic(
        &mut self,
        name: &str,
        script: Arc<dyn PeriodicScript>,
    ) -> Result<(), ResolutionError> {
        insert_unique(&mut self.periodics, name, script)
    }

    pub fn behavior(&self, name: &str) -> Option<Arc<dyn BehaviorScript>> {
        self.behaviors.get(name).cloned()
    }

    pub fn render(&self, name: &str) -> Option<Arc<dyn RenderScript>> {
        self.renders.get(name).cloned()
    }

    pub fn periodic(&self, name: &str) -> Option<Arc<dyn PeriodicScript>> {
        self.periodics.get(name).cloned()
    }
}

fn insert_unique<T: ?Sized>(
    table: &mut HashMap<String, Arc<T>>,
    name: &str,
    script: Arc<T>,
) -> Result<(), ResolutionError> {
    if table.contains_key(name) {
        return Err(ResolutionError::DuplicateScript(name.to_owned()));
    }
    table.insert(name.to_owned(), script);
    Ok(())
}

impl fmt::Debug for ScriptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRegistry")
            .field("behaviors", &sorted_names(&self.behaviors))
            .field("renders", &sorted_names(&self.renders))
            .field("periodics", &sorted_names(&self.periodics))
            .finish()
    }
}

fn sorted_names<T: ?Sized>(table: &HashMap<String, Arc<T>>) -> Vec<&str> {
    let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}
