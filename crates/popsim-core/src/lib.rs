//! Core types and definitions for popsim.
//!
//! This crate defines the vocabulary shared by the engine and by plugin
//! crates: vectors, tick schedules, the per-entity data store, configuration
//! and the drawing-surface contract. It spawns no threads.

pub mod config;
pub mod constants;
pub mod data;
pub mod schedule;
pub mod surface;
pub mod vector;

pub use config::{ConfigError, SimConfig};
pub use data::{Data, DataError};
pub use schedule::{ScheduleError, TickSchedule};
pub use surface::{Color, Shape, Surface};
pub use vector::Vector;

#[cfg(test)]
mod tests;
