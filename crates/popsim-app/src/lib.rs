//! Headless front end for popsim.
//!
//! Loads a JSON configuration, registers the built-in scripts and drives a
//! [`popsim_sim::Simulation`] in real time, optionally printing frames as
//! text.

pub mod cli;
pub mod config_file;
pub mod error;
pub mod runner;
pub mod text_surface;

pub use error::AppError;

#[cfg(test)]
mod tests;
