//! Entities and entity types.
//!
//! Position is triple-buffered: `past` and `current` are what every other
//! entity observes during a tick, `future` is the only slot the entity's own
//! behaviors write. Buffers rotate at post-update, once per
//! tick, after all updates and renders have finished.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use popsim_core::config::EntityTypeConfig;
use popsim_core::{Data, ScheduleError, Surface, TickSchedule, Vector};

use crate::error::{BuildError, TickError};
use crate::script::{BehaviorScript, RenderScript, ResolutionError, ScriptError, ScriptRegistry};
use crate::sync::{lock, read, write};
use crate::world::World;

/// Unique, monotonically assigned entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Shared descriptor of one kind of entity.
///
/// Script order is significant: a script's index is its schedule slot.
pub struct EntityType {
    name: String,
    behaviors: Vec<Arc<dyn BehaviorScript>>,
    renders: Vec<Arc<dyn RenderScript>>,
    template: Data,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviors: Vec::new(),
            renders: Vec::new(),
            template: Data::new(),
        }
    }

    pub fn with_behavior(mut self, script: Arc<dyn BehaviorScript>) -> Self {
        self.behaviors.push(script);
        self
    }

    pub fn with_render(mut self, script: Arc<dyn RenderScript>) -> Self {
        self.renders.push(script);
        self
    }

    pub fn with_data(mut self, template: Data) -> Self {
        self.template = template;
        self
    }

    /// Build a type from its configuration, looking every script name up in
    /// `registry`.
    pub fn resolve(
        name: &str,
        config: &EntityTypeConfig,
        registry: &ScriptRegistry,
    ) -> Result<Self, BuildError> {
        let mut ty = EntityType::new(name).with_data(Data::from_json_map(&config.data)?);
        for script in &config.behavior_scripts {
            let found = registry.behavior(script).ok_or_else(|| {
                ResolutionError::UnknownBehaviorScript {
                    entity_type: name.to_owned(),
                    script: script.clone(),
                }
            })?;
            ty.behaviors.push(found);
        }
        for script in &config.render_scripts {
            let found =
                registry
                    .render(script)
                    .ok_or_else(|| ResolutionError::UnknownRenderScript {
                        entity_type: name.to_owned(),
                        script: script.clone(),
                    })?;
            ty.renders.push(found);
        }
        Ok(ty)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior_scripts(&self) -> &[Arc<dyn BehaviorScript>] {
        &self.behaviors
    }

    pub fn render_scripts(&self) -> &[Arc<dyn RenderScript>] {
        &self.renders
    }

    /// Default data copied into every new instance.
    pub fn template(&self) -> &Data {
        &self.template
    }

    fn behavior_slot(&self, script: &dyn BehaviorScript) -> Option<usize> {
        let wanted: *const dyn BehaviorScript = script;
        self.behaviors
            .iter()
            .position(|s| std::ptr::addr_eq(Arc::as_ptr(s), wanted))
    }

    fn render_slot(&self, script: &dyn RenderScript) -> Option<usize> {
        let wanted: *const dyn RenderScript = script;
        self.renders
            .iter()
            .position(|s| std::ptr::addr_eq(Arc::as_ptr(s), wanted))
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("behaviors", &self.behaviors.len())
            .field("renders", &self.renders.len())
            .field("template", &self.template)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct History {
    past: Vector,
    current: Vector,
}

/// Serializable view of an entity's observable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub entity_type: String,
    pub past: Vector,
    pub current: Vector,
}

/// One agent in the world.
///
/// Shared as `Arc<Entity>` between the world, snapshots and worker threads;
/// every mutable part sits behind its own lock.
pub struct Entity {
    id: EntityId,
    ty: Arc<EntityType>,
    rng: Mutex<ChaCha8Rng>,
    data: Mutex<Data>,
    history: RwLock<History>,
    future: Mutex<Vector>,
    behavior_schedule: Mutex<TickSchedule>,
    render_schedule: Mutex<TickSchedule>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, ty: Arc<EntityType>, seed: u64) -> Self {
        let data = ty.template.clone();
        let behavior_schedule = TickSchedule::new(ty.behaviors.len());
        let render_schedule = TickSchedule::new(ty.renders.len());
        Self {
            id,
            ty,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            data: Mutex::new(data),
            history: RwLock::new(History::default()),
            future: Mutex::new(Vector::ZERO),
            behavior_schedule: Mutex::new(behavior_schedule),
            render_schedule: Mutex::new(render_schedule),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    /// Position at the end of the previous tick.
    pub fn past(&self) -> Vector {
        read(&self.history).past
    }

    /// Position visible to everyone during the current tick.
    pub fn current(&self) -> Vector {
        read(&self.history).current
    }

    /// Position that becomes current at the end of this tick.
    pub fn future(&self) -> Vector {
        *lock(&self.future)
    }

    /// Displacement over the last tick divided by `timestep`.
    pub fn velocity(&self, timestep: f64) -> Vector {
        let h = *read(&self.history);
        (h.current - h.past).scale(1.0 / timestep)
    }

    /// Place the entity, resetting all three buffers. Meant for freshly
    /// spawned entities that are not live yet.
    pub fn set_position(&self, position: Vector) {
        *write(&self.history) = History {
            past: position,
            current: position,
        };
        *lock(&self.future) = position;
    }

    /// Write the next position. Only the entity's own behaviors may call this.
    pub fn set_future(&self, position: Vector) {
        *lock(&self.future) = position;
    }

    /// Overwrite the current position without rotating. Only valid from a
    /// behavior's `finalize` hook, when no other thread reads positions.
    pub fn set_current(&self, position: Vector) {
        write(&self.history).current = position;
    }

    /// Overwrite the past position. Same restriction as [`Entity::set_current`].
    pub fn set_past(&self, position: Vector) {
        write(&self.history).past = position;
    }

    /// The entity's private random stream, seeded from the world RNG.
    pub fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        lock(&self.rng)
    }

    /// Run `f` against the entity's data.
    ///
    /// Scripts get the data as an argument; calling this from inside one of
    /// this entity's own scripts deadlocks.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut Data) -> R) -> R {
        f(&mut lock(&self.data))
    }

    pub fn state(&self) -> EntityState {
        let h = *read(&self.history);
        EntityState {
            id: self.id,
            entity_type: self.ty.name.clone(),
            past: h.past,
            current: h.current,
        }
    }

    /// Arm `script`'s behavior slot to fire after `delay` ticks.
    pub fn schedule_behavior(&self, script: &dyn BehaviorScript, delay: u64) -> Result<(), ScriptError> {
        let slot = self
            .ty
            .behavior_slot(script)
            .ok_or_else(|| ScriptError::NotAttached(self.ty.name.clone()))?;
        Ok(self.schedule_behavior_slot(slot, delay)?)
    }

    pub fn schedule_behavior_slot(&self, slot: usize, delay: u64) -> Result<(), ScheduleError> {
        lock(&self.behavior_schedule).schedule(slot, delay)
    }

    pub fn cancel_behavior_slot(&self, slot: usize) -> Result<(), ScheduleError> {
        lock(&self.behavior_schedule).cancel(slot)
    }

    /// Arm `script`'s render slot to fire after `delay` ticks.
    pub fn schedule_render(&self, script: &dyn RenderScript, delay: u64) -> Result<(), ScriptError> {
        let slot = self
            .ty
            .render_slot(script)
            .ok_or_else(|| ScriptError::NotAttached(self.ty.name.clone()))?;
        Ok(self.schedule_render_slot(slot, delay)?)
    }

    pub fn schedule_render_slot(&self, slot: usize, delay: u64) -> Result<(), ScheduleError> {
        lock(&self.render_schedule).schedule(slot, delay)
    }

    /// Run every script's init hook. Called once, when the entity goes live.
    pub(crate) fn init(&self, world: &World) -> Result<(), TickError> {
        let mut data = lock(&self.data);
        let fail = |source| TickError::Init {
            entity: self.id,
            source,
        };
        for script in &self.ty.behaviors {
            script.init(world, self, &mut data).map_err(fail)?;
        }
        for script in &self.ty.renders {
            script.init(world, self, &mut data).map_err(fail)?;
        }
        Ok(())
    }

    /// Advance the behavior schedule and run every slot that fires.
    /// Returns the number of behaviors run.
    pub fn update(&self, world: &World) -> Result<usize, TickError> {
        // Release the schedule before dispatch so scripts can re-arm.
        let due = lock(&self.behavior_schedule).tick();
        if due.is_empty() {
            return Ok(0);
        }
        let mut data = lock(&self.data);
        for &slot in &due {
            self.ty.behaviors[slot]
                .behave(world, self, &mut data)
                .map_err(|source| TickError::Behavior {
                    entity: self.id,
                    slot,
                    source,
                })?;
        }
        Ok(due.len())
    }

    /// Advance the render schedule and draw every slot that fires.
    pub fn render(&self, world: &World, surface: &mut dyn Surface) -> Result<usize, TickError> {
        let due = lock(&self.render_schedule).tick();
        if due.is_empty() {
            return Ok(0);
        }
        let mut data = lock(&self.data);
        for &slot in &due {
            self.ty.renders[slot]
                .render(world, self, &mut data, surface)
                .map_err(|source| TickError::Render {
                    entity: self.id,
                    slot,
                    source,
                })?;
        }
        Ok(due.len())
    }

    /// Run every behavior's finalize hook. Buffers are left alone.
    pub fn finalize(&self, world: &World) -> Result<(), TickError> {
        let mut data = lock(&self.data);
        for (slot, script) in self.ty.behaviors.iter().enumerate() {
            script
                .finalize(world, self, &mut data)
                .map_err(|source| TickError::Finalize {
                    entity: self.id,
                    slot,
                    source,
                })?;
        }
        Ok(())
    }

    /// Rotate buffers: past ← current ← future.
    pub(crate) fn promote(&self) {
        let future = *lock(&self.future);
        let mut h = write(&self.history);
        h.past = h.current;
        h.current = future;
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = *read(&self.history);
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("type", &self.ty.name)
            .field("past", &h.past)
            .field("current", &h.current)
            .finish()
    }
}
