//! Short-range repulsion between entities of the same type.
//!
//! Each tick an entity sums `d / |d|²` over every same-type neighbor within
//! range, where `d` points from the neighbor to itself, scales the sum into
//! an acceleration and integrates with semi-implicit Euler:
//!
//! ```text
//! v      = damping * (current - past) / dt + accel * dt
//! future = current + v * dt
//! ```
//!
//! At finalize, a future position outside the world (inset by the entity
//! radius) is mirrored back across the wall it crossed, losing `damping` of
//! its overshoot.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use popsim_core::constants::{
    ENTITY_RADIUS, REPEL_DAMPING, REPEL_FORCE, REPEL_MAX_JITTER_RETRIES, REPEL_RANGE,
};
use popsim_core::{Data, Vector};
use popsim_sim::{BehaviorScript, Entity, EntityId, ScriptResult, World};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repel {
    /// Neighbors farther than this are ignored.
    pub range: f64,
    /// Acceleration per unit of summed inverse-square displacement.
    pub force: f64,
    /// Velocity kept per tick and per bounce.
    pub damping: f64,
    /// Inset from each wall.
    pub radius: f64,
}

impl Default for Repel {
    fn default() -> Self {
        Self {
            range: REPEL_RANGE,
            force: REPEL_FORCE,
            damping: REPEL_DAMPING,
            radius: ENTITY_RADIUS,
        }
    }
}

impl Repel {
    /// Summed `d / |d|²` over in-range neighbors of the same type.
    fn push(&self, world: &World, entity: &Entity) -> Vector {
        let here = entity.current();
        let range_sq = self.range * self.range;
        let mut push = Vector::ZERO;

        for other in world.snapshot().iter() {
            if other.id() == entity.id() || !Arc::ptr_eq(other.entity_type(), entity.entity_type())
            {
                continue;
            }
            let mut diff = here - other.current();
            let mut mag_sq = diff.square_mag();
            if mag_sq > range_sq {
                continue;
            }
            if mag_sq == 0.0 {
                diff = separation(world.seed(), entity.id(), other.id());
                mag_sq = diff.square_mag();
            }
            push += diff.scale(1.0 / mag_sq);
        }
        push
    }

    /// Mirror `future` (and `current` with it) back inside `[low, high]`
    /// along one axis.
    fn reflect(&self, current: &mut f64, future: &mut f64, low: f64, high: f64) -> bool {
        if *future < low {
            *current = low - (*current - low) * self.damping;
            *future = low + (low - *future) * self.damping;
            true
        } else if *future > high {
            *current = high + (high - *current) * self.damping;
            *future = high - (*future - high) * self.damping;
            true
        } else {
            false
        }
    }
}

/// Direction to push two coincident entities apart.
///
/// Drawn from a stream keyed on the unordered pair rather than from either
/// entity's own `rng`. Independent per-entity draws can point both entities
/// the same way, so a coincident pair might never separate. A shared draw
/// gives both entities the same vector with opposite signs. It also leaves
/// each entity's RNG stream unaffected by which neighbors it happens to
/// overlap.
fn separation(seed: u64, me: EntityId, other: EntityId) -> Vector {
    let (low, high) = if me < other { (me, other) } else { (other, me) };
    let sign = if me == low { 1.0 } else { -1.0 };
    let mut rng = ChaCha8Rng::seed_from_u64(
        seed ^ low.0.rotate_left(32) ^ high.0.wrapping_mul(0x9E37_79B9_7F4A_7C15),
    );
    for _ in 0..REPEL_MAX_JITTER_RETRIES {
        let jitter = Vector::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5));
        if jitter.square_mag() > 0.0 {
            return jitter.scale(sign);
        }
    }
    Vector::new(sign, 0.0)
}

impl BehaviorScript for Repel {
    fn init(&self, _world: &World, entity: &Entity, _data: &mut Data) -> ScriptResult {
        entity.schedule_behavior(self, 1)
    }

    fn behave(&self, world: &World, entity: &Entity, _data: &mut Data) -> ScriptResult {
        let dt = world.timestep();
        let accel = self.push(world, entity).scale(self.force);
        let velocity = entity.velocity(dt).scale(self.damping) + accel.scale(dt);
        entity.set_future(entity.current() + velocity.scale(dt));
        entity.schedule_behavior(self, 1)
    }

    fn finalize(&self, world: &World, entity: &Entity, _data: &mut Data) -> ScriptResult {
        let mut current = entity.current();
        let mut future = entity.future();
        let x_hit = self.reflect(
            &mut current.x,
            &mut future.x,
            self.radius,
            world.width() as f64 - self.radius,
        );
        let y_hit = self.reflect(
            &mut current.y,
            &mut future.y,
            self.radius,
            world.height() as f64 - self.radius,
        );
        if x_hit || y_hit {
            entity.set_current(current);
            entity.set_future(future);
        }
        Ok(())
    }
}
