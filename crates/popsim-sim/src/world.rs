//! The world: entity registry, per-tick snapshot, deferred spawn/kill queues
//! and spatial queries.
//!
//! The live list changes only at the two safe points, [`World::pre_update`]
//! and [`World::post_update`]. Everything that runs in between reads the
//! immutable [`Snapshot`] taken at pre-update, while spawns and kills issued
//! from any thread wait in their queues.

use std::collections::{BTreeMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use popsim_core::config::WorldLayout;
use popsim_core::constants::BACKGROUND;
use popsim_core::{SimConfig, Surface, TickSchedule, Vector};

use crate::entity::{Entity, EntityId, EntityState, EntityType};
use crate::error::{BuildError, TickError};
use crate::script::{PeriodicScript, ResolutionError, ScriptRegistry};
use crate::sync::{lock, read, write};

/// Immutable view of the live entities, taken once per tick.
#[derive(Debug, Default)]
pub struct Snapshot {
    tick: u64,
    entities: Vec<Arc<Entity>>,
}

impl Snapshot {
    /// Tick this snapshot was taken for.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn entities(&self) -> &[Arc<Entity>] {
        &self.entities
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.iter().any(|e| e.id() == id)
    }

    pub fn states(&self) -> Vec<EntityState> {
        self.entities.iter().map(|e| e.state()).collect()
    }
}

impl Deref for Snapshot {
    type Target = [Arc<Entity>];

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

struct PeriodicEntry {
    name: String,
    script: Arc<dyn PeriodicScript>,
    period: u64,
    delay: u64,
}

enum Placement {
    Point(Vector),
    Random,
}

/// Initial population, resolved at construction.
struct Population {
    ty: Arc<EntityType>,
    count: usize,
    placement: Placement,
}

/// Output of [`World::pre_update`].
#[derive(Debug)]
pub struct PreUpdate {
    pub snapshot: Arc<Snapshot>,
    /// Entities that went live this tick.
    pub spawned: usize,
}

/// Output of [`World::post_update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostUpdate {
    /// Live entities removed this tick.
    pub killed: usize,
}

pub struct World {
    width: u32,
    height: u32,
    timestep: f64,
    seed: u64,
    types: BTreeMap<String, Arc<EntityType>>,
    periodics: Vec<PeriodicEntry>,
    periodic_schedule: Mutex<TickSchedule>,
    population: Option<Population>,
    rng: Mutex<ChaCha8Rng>,
    initialized: AtomicBool,
    next_id: AtomicU64,
    ticks: AtomicU64,
    live: Mutex<Vec<Arc<Entity>>>,
    snapshot: RwLock<Arc<Snapshot>>,
    spawn_queue: Mutex<Vec<Arc<Entity>>>,
    kill_queue: Mutex<Vec<EntityId>>,
}

impl World {
    /// Validate `config` and resolve every script and entity-type reference
    /// against `registry`.
    pub fn new(config: &SimConfig, registry: &ScriptRegistry) -> Result<Self, BuildError> {
        config.validate()?;

        let mut types = BTreeMap::new();
        for (name, ty_config) in &config.entity_types {
            let ty = EntityType::resolve(name, ty_config, registry)?;
            types.insert(name.clone(), Arc::new(ty));
        }

        let mut periodics = Vec::with_capacity(config.periodic_scripts.len());
        for entry in &config.periodic_scripts {
            let script = registry
                .periodic(&entry.script)
                .ok_or_else(|| ResolutionError::UnknownPeriodicScript(entry.script.clone()))?;
            periodics.push(PeriodicEntry {
                name: entry.script.clone(),
                script,
                period: entry.period,
                delay: entry.delay.unwrap_or(entry.period),
            });
        }

        let lookup = |name: &str| {
            types
                .get(name)
                .cloned()
                .ok_or_else(|| ResolutionError::UnknownEntityType(name.to_owned()))
        };
        let population = match &config.layout {
            WorldLayout::Empty => None,
            WorldLayout::Cluster {
                entity_type,
                count,
                at,
            } => {
                let center = Vector::new(config.width() as f64 / 2.0, config.height() as f64 / 2.0);
                Some(Population {
                    ty: lookup(entity_type)?,
                    count: *count,
                    placement: Placement::Point(at.map_or(center, |[x, y]| Vector::new(x, y))),
                })
            }
            WorldLayout::Scatter { entity_type, count } => Some(Population {
                ty: lookup(entity_type)?,
                count: *count,
                placement: Placement::Random,
            }),
        };

        let seed = config.seed();
        Ok(Self {
            width: config.width(),
            height: config.height(),
            timestep: config.timestep(),
            seed,
            types,
            periodic_schedule: Mutex::new(TickSchedule::new(periodics.len())),
            periodics,
            population,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            initialized: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            ticks: AtomicU64::new(0),
            live: Mutex::new(Vec::new()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            spawn_queue: Mutex::new(Vec::new()),
            kill_queue: Mutex::new(Vec::new()),
        })
    }

    /// One-time setup: run periodic init hooks, arm their schedules and
    /// enqueue the initial population. Later calls do nothing.
    pub fn init(&self) -> Result<(), TickError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        {
            let mut schedule = lock(&self.periodic_schedule);
            for (slot, entry) in self.periodics.iter().enumerate() {
                entry.script.init(self).map_err(|source| TickError::Periodic {
                    script: entry.name.clone(),
                    source,
                })?;
                schedule
                    .schedule(slot, entry.delay)
                    .map_err(|e| TickError::Periodic {
                        script: entry.name.clone(),
                        source: e.into(),
                    })?;
            }
        }
        if let Some(population) = &self.population {
            for _ in 0..population.count {
                let position = match population.placement {
                    Placement::Point(p) => p,
                    Placement::Random => self.random_position(),
                };
                self.spawn_at(&population.ty, position);
            }
        }
        log::info!(
            "World initialized [{}x{}] seed: {}",
            self.width,
            self.height,
            self.seed
        );
        Ok(())
    }

    /// First safe point: fire periodic scripts, bring queued spawns live and
    /// publish a fresh snapshot.
    pub fn pre_update(&self) -> Result<PreUpdate, TickError> {
        self.run_periodic()?;

        let spawned = std::mem::take(&mut *lock(&self.spawn_queue));
        for entity in &spawned {
            entity.init(self)?;
        }
        let count = spawned.len();

        let snapshot = {
            let mut live = lock(&self.live);
            live.extend(spawned);
            Arc::new(Snapshot {
                tick: self.tick_count(),
                entities: live.clone(),
            })
        };
        *write(&self.snapshot) = Arc::clone(&snapshot);
        if count > 0 {
            log::debug!("tick {}: {} entities went live", snapshot.tick, count);
        }
        Ok(PreUpdate {
            snapshot,
            spawned: count,
        })
    }

    fn run_periodic(&self) -> Result<(), TickError> {
        if self.periodics.is_empty() {
            return Ok(());
        }
        let mut schedule = lock(&self.periodic_schedule);
        let mut fired = Vec::new();
        schedule.tick_with(|slot| {
            let entry = &self.periodics[slot];
            entry.script.run(self).map_err(|source| TickError::Periodic {
                script: entry.name.clone(),
                source,
            })?;
            fired.push(slot);
            Ok(())
        })?;
        for slot in fired {
            let entry = &self.periodics[slot];
            schedule
                .schedule(slot, entry.period)
                .map_err(|e| TickError::Periodic {
                    script: entry.name.clone(),
                    source: e.into(),
                })?;
        }
        Ok(())
    }

    /// Second safe point: finalize every snapshot entity, promote them all,
    /// then apply queued kills. A failing finalize hook leaves every buffer
    /// unpromoted.
    pub fn post_update(&self, snapshot: &Snapshot) -> Result<PostUpdate, TickError> {
        for entity in snapshot.iter() {
            entity.finalize(self)?;
        }
        for entity in snapshot.iter() {
            entity.promote();
        }

        let kills: HashSet<EntityId> = lock(&self.kill_queue).drain(..).collect();
        let mut killed = 0;
        if !kills.is_empty() {
            let mut live = lock(&self.live);
            let before = live.len();
            live.retain(|e| !kills.contains(&e.id()));
            killed = before - live.len();
            // Killed before going live: never initialized, never ticked.
            lock(&self.spawn_queue).retain(|e| !kills.contains(&e.id()));
        }

        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(PostUpdate { killed })
    }

    /// Draw every snapshot entity. Runs on the render thread.
    pub fn render(&self, snapshot: &Snapshot, surface: &mut dyn Surface) -> Result<usize, TickError> {
        surface.clear(BACKGROUND);
        let mut drawn = 0;
        for entity in snapshot.iter() {
            drawn += entity.render(self, surface)?;
        }
        surface.present();
        Ok(drawn)
    }

    /// Create an entity at the origin. It goes live at the next pre-update.
    pub fn spawn(&self, ty: &Arc<EntityType>) -> Arc<Entity> {
        self.spawn_at(ty, Vector::ZERO)
    }

    /// Create an entity at `position`. It goes live at the next pre-update.
    pub fn spawn_at(&self, ty: &Arc<EntityType>, position: Vector) -> Arc<Entity> {
        let id = EntityId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entity = Arc::new(Entity::new(id, Arc::clone(ty), self.new_random_seed()));
        entity.set_position(position);
        lock(&self.spawn_queue).push(Arc::clone(&entity));
        entity
    }

    /// Spawn by type name.
    pub fn spawn_named(&self, name: &str, position: Vector) -> Result<Arc<Entity>, ResolutionError> {
        let ty = self
            .entity_type(name)
            .ok_or_else(|| ResolutionError::UnknownEntityType(name.to_owned()))?;
        Ok(self.spawn_at(&ty, position))
    }

    /// Mark `id` for removal at the end of the current (or next) tick.
    /// Killing twice, or killing an unknown id, is harmless.
    pub fn kill(&self, id: EntityId) {
        lock(&self.kill_queue).push(id);
    }

    /// Snapshot entities within `radius` of `origin`, boundary included.
    pub fn entities_in_range(&self, origin: Vector, radius: f64) -> Vec<Arc<Entity>> {
        let r2 = radius * radius;
        self.snapshot()
            .iter()
            .filter(|e| e.current().distance_sq(origin) <= r2)
            .cloned()
            .collect()
    }

    /// Nearest snapshot entity to `origin`.
    pub fn closest_entity(&self, origin: Vector) -> Option<Arc<Entity>> {
        self.closest_matching(origin, |_| true)
    }

    /// Nearest snapshot entity to `origin` other than `exclude`.
    pub fn closest_entity_except(&self, origin: Vector, exclude: EntityId) -> Option<Arc<Entity>> {
        self.closest_matching(origin, |e| e.id() != exclude)
    }

    fn closest_matching(
        &self,
        origin: Vector,
        keep: impl Fn(&Entity) -> bool,
    ) -> Option<Arc<Entity>> {
        self.snapshot()
            .iter()
            .filter(|e| keep(e))
            .map(|e| (e.current().distance_sq(origin), e))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| Arc::clone(e))
    }

    /// Draw a seed from the world RNG for a new private stream.
    pub fn new_random_seed(&self) -> u64 {
        lock(&self.rng).next_u64()
    }

    fn random_position(&self) -> Vector {
        let mut rng = lock(&self.rng);
        Vector::new(
            rng.gen_range(0.0..self.width as f64),
            rng.gen_range(0.0..self.height as f64),
        )
    }

    /// Most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&read(&self.snapshot))
    }

    pub fn entity_type(&self, name: &str) -> Option<Arc<EntityType>> {
        self.types.get(name).cloned()
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.types.values()
    }

    /// Completed ticks.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn live_count(&self) -> usize {
        lock(&self.live).len()
    }

    pub fn pending_spawns(&self) -> usize {
        lock(&self.spawn_queue).len()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Simulated seconds per tick.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("seed", &self.seed)
            .field("ticks", &self.tick_count())
            .field("live", &self.live_count())
            .finish()
    }
}
