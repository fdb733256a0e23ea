//! Engine defaults and tuning parameters.

use crate::surface::Color;

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Default tick rate (Hz).
pub const DEFAULT_TICK_FREQUENCY: u32 = 60;

/// Default world dimensions `[width, height]`.
pub const DEFAULT_WORLD_SIZE: [u32; 2] = [100, 100];

/// Color the render thread clears the surface to before each frame.
pub const BACKGROUND: Color = Color::BLACK;

// --- Repulsion ---

/// Interaction cutoff distance.
pub const REPEL_RANGE: f64 = 128.0;

/// Scale from summed inverse-square displacement to acceleration.
pub const REPEL_FORCE: f64 = 512.0;

/// Velocity multiplier applied every tick and on each wall bounce.
pub const REPEL_DAMPING: f64 = 0.99;

/// Upper bound on jitter redraws for coincident entities.
pub const REPEL_MAX_JITTER_RETRIES: u32 = 16;

// --- Rendering ---

/// Default dot diameter in world units.
pub const DOT_SIZE: f64 = 1.5;

/// Default collision radius of an entity (half the dot diameter).
pub const ENTITY_RADIUS: f64 = DOT_SIZE / 2.0;
