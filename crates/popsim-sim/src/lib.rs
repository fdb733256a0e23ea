//! Fixed-tick simulation engine for popsim.
//!
//! [`World`] holds the entities, [`TickPipeline`] runs one tick (parallel
//! update alongside a dedicated render thread, joined by a barrier) and
//! [`Simulation`] drives the pipeline in real time with pause, resume and
//! shutdown. Behavior lives in plugin scripts registered by name in a
//! [`ScriptRegistry`].

pub mod entity;
pub mod error;
pub mod pipeline;
mod render;
pub mod script;
pub mod simulation;
mod sync;
pub mod world;

pub use entity::{Entity, EntityId, EntityState, EntityType};
pub use error::{BuildError, SimulationError, TickError};
pub use pipeline::{TickOutcome, TickPipeline, TickReport};
pub use popsim_core as core;
pub use script::{
    BehaviorScript, PeriodicScript, RenderScript, ResolutionError, ScriptError, ScriptRegistry,
    ScriptResult,
};
pub use simulation::{SimState, Simulation};
pub use world::{Snapshot, World};
