//! A [`Surface`] that rasterizes frames into characters.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use popsim_core::{Color, Shape, Surface, Vector};

const BLANK: char = ' ';

/// Character grid covering the whole world. Each `fill` marks the cell
/// holding the shape's center with a glyph chosen by brightness.
pub struct TextSurface {
    columns: usize,
    rows: usize,
    cell_width: f64,
    cell_height: f64,
    grid: Vec<char>,
    frames: u64,
    print_every: u64,
    out: Option<Box<dyn Write + Send>>,
    latest: Arc<Mutex<String>>,
}

impl TextSurface {
    /// Grid `columns` wide; rows follow the world's aspect ratio, halved
    /// because terminal cells are about twice as tall as wide.
    pub fn for_world(width: u32, height: u32, columns: usize) -> Self {
        let columns = columns.max(1);
        let rows = ((columns as f64 * height as f64 / width.max(1) as f64) / 2.0)
            .round()
            .max(1.0) as usize;
        Self {
            columns,
            rows,
            cell_width: width as f64 / columns as f64,
            cell_height: height as f64 / rows as f64,
            grid: vec![BLANK; columns * rows],
            frames: 0,
            print_every: 0,
            out: None,
            latest: Arc::new(Mutex::new(String::new())),
        }
    }

    /// Write every `every`-th presented frame to `out`.
    pub fn with_output(mut self, every: u64, out: Box<dyn Write + Send>) -> Self {
        self.print_every = every;
        self.out = Some(out);
        self
    }

    /// Shared handle to the most recently presented frame.
    pub fn latest_frame(&self) -> Arc<Mutex<String>> {
        Arc::clone(&self.latest)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    fn cell(&self, center: Vector) -> Option<usize> {
        if center.x < 0.0 || center.y < 0.0 {
            return None;
        }
        let col = (center.x / self.cell_width) as usize;
        let row = (center.y / self.cell_height) as usize;
        (col < self.columns && row < self.rows).then(|| row * self.columns + col)
    }

    fn text(&self) -> String {
        let mut text = String::with_capacity((self.columns + 1) * self.rows);
        for row in self.grid.chunks(self.columns) {
            text.extend(row);
            text.push('\n');
        }
        text
    }
}

fn glyph(shape: Shape, color: Color) -> char {
    match (shape, color.luma()) {
        (Shape::Square, _) => '#',
        (Shape::Circle, l) if l > 0.66 => '@',
        (Shape::Circle, l) if l > 0.33 => 'o',
        (Shape::Circle, _) => '.',
    }
}

impl Surface for TextSurface {
    fn clear(&mut self, _color: Color) {
        self.grid.fill(BLANK);
    }

    fn fill(&mut self, shape: Shape, center: Vector, _size: f64, color: Color) {
        if let Some(i) = self.cell(center) {
            self.grid[i] = glyph(shape, color);
        }
    }

    fn present(&mut self) {
        self.frames += 1;
        let text = self.text();
        if self.print_every > 0 && self.frames % self.print_every == 0 {
            if let Some(out) = self.out.as_mut() {
                let border = "-".repeat(self.columns);
                let written = write!(out, "frame {}\n{border}\n{text}{border}\n", self.frames)
                    .and_then(|()| out.flush());
                if let Err(e) = written {
                    log::warn!("failed to print frame {}: {e}", self.frames);
                }
            }
        }
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = text;
    }
}
