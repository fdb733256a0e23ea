//! Filled-circle renderer.
//!
//! Reads `size` (diameter, number) and `color` (`#rrggbb`) from the entity's
//! data, falling back to the default dot size and white.

use popsim_core::constants::DOT_SIZE;
use popsim_core::{Color, Data, Shape, Surface};
use popsim_sim::{Entity, RenderScript, ScriptError, ScriptResult, World};

/// Data key holding the parsed color.
const PARSED_COLOR: &str = "dot.color";

#[derive(Debug, Clone, Copy, Default)]
pub struct Dot;

impl RenderScript for Dot {
    fn init(&self, _world: &World, entity: &Entity, data: &mut Data) -> ScriptResult {
        let hex = data.get("color", String::new())?;
        let color = if hex.is_empty() {
            Color::WHITE
        } else {
            hex.parse::<Color>().map_err(ScriptError::Failed)?
        };
        data.set(PARSED_COLOR, color);
        entity.schedule_render(self, 1)
    }

    fn render(
        &self,
        _world: &World,
        entity: &Entity,
        data: &mut Data,
        surface: &mut dyn Surface,
    ) -> ScriptResult {
        let size = data.get("size", DOT_SIZE)?;
        let color = data.get(PARSED_COLOR, Color::WHITE)?;
        surface.fill(Shape::Circle, entity.current(), size, color);
        entity.schedule_render(self, 1)
    }
}
