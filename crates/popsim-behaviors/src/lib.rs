//! Built-in scripts for popsim.
//!
//! - `repel`: short-range same-type repulsion with damped wall bounces.
//! - `dot`: draws each entity as a filled circle.
//! - `census`: periodically logs the live population.

pub mod census;
pub mod dot;
pub mod repel;

use std::sync::Arc;

use popsim_sim::{ResolutionError, ScriptRegistry};

pub use census::{Census, CensusReport};
pub use dot::Dot;
pub use repel::Repel;

/// Register every built-in script under its default name.
pub fn register_builtin_scripts(registry: &mut ScriptRegistry) -> Result<(), ResolutionError> {
    registry.register_behavior("repel", Arc::new(Repel::default()))?;
    registry.register_render("dot", Arc::new(Dot))?;
    registry.register_periodic("census", Arc::new(Census::default()))?;
    Ok(())
}

#[cfg(test)]
mod tests;
