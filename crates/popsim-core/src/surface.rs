//! Drawing-surface contract consumed by render scripts.
//!
//! The engine treats a surface as an opaque sink. It is owned by exactly one
//! thread (the render thread), so implementations need `Send` but not `Sync`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::vector::Vector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Perceived brightness in `[0, 1]`.
    pub fn luma(self) -> f64 {
        (0.299 * self.r as f64 + 0.587 * self.g as f64 + 0.114 * self.b as f64) / 255.0
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parses `#rrggbb` (the leading `#` is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb, got {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("{s:?}: {e}"))
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Circle,
    Square,
}

/// Something entities can be drawn onto.
pub trait Surface: Send {
    /// Fill the whole surface with `color`.
    fn clear(&mut self, color: Color);

    /// Draw a filled `shape` of diameter `size` centered at `center`.
    fn fill(&mut self, shape: Shape, center: Vector, size: f64, color: Color);

    /// Called once per frame after every entity has been drawn.
    fn present(&mut self) {}
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn clear(&mut self, _color: Color) {}

    fn fill(&mut self, _shape: Shape, _center: Vector, _size: f64, _color: Color) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    Clear(Color),
    Fill {
        shape: Shape,
        center: Vector,
        size: f64,
        color: Color,
    },
}

/// Frames captured by a [`RecordingSurface`].
#[derive(Debug, Default)]
pub struct DrawLog {
    /// Number of frames presented so far.
    pub frames: u64,
    /// Commands of the most recently presented frame.
    pub last_frame: Vec<DrawCommand>,
    pending: Vec<DrawCommand>,
}

/// Records draw commands for inspection from another thread.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    log: Arc<Mutex<DrawLog>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the log; stays valid after the surface moves to the
    /// render thread.
    pub fn log(&self) -> Arc<Mutex<DrawLog>> {
        Arc::clone(&self.log)
    }

    fn push(&self, command: DrawCommand) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.pending.push(command);
    }
}

impl Surface for RecordingSurface {
    fn clear(&mut self, color: Color) {
        self.push(DrawCommand::Clear(color));
    }

    fn fill(&mut self, shape: Shape, center: Vector, size: f64, color: Color) {
        self.push(DrawCommand::Fill {
            shape,
            center,
            size,
            color,
        });
    }

    fn present(&mut self) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.last_frame = std::mem::take(&mut log.pending);
        log.frames += 1;
    }
}
