//! Runs a simulation in real time until a tick budget is spent or a tick
//! fails.

use std::io::Write;
use std::thread;

use serde::Serialize;

use popsim_behaviors::register_builtin_scripts;
use popsim_core::SimConfig;
use popsim_sim::{ScriptRegistry, SimState, Simulation};

use crate::cli::RunOptions;
use crate::error::AppError;
use crate::text_surface::TextSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub live: usize,
}

/// Registry holding every built-in script.
pub fn builtin_registry() -> Result<ScriptRegistry, AppError> {
    let mut registry = ScriptRegistry::new();
    register_builtin_scripts(&mut registry)?;
    Ok(registry)
}

pub fn run(
    config: &SimConfig,
    options: &RunOptions,
    out: Box<dyn Write + Send>,
) -> Result<RunSummary, AppError> {
    let registry = builtin_registry()?;
    let surface = TextSurface::for_world(config.width(), config.height(), options.columns)
        .with_output(options.frame_every, out);
    let mut sim = Simulation::new(config, &registry, Box::new(surface))?;
    sim.begin()?;

    let world = std::sync::Arc::clone(sim.world());
    let poll = sim.tick_interval();
    loop {
        if sim.state() == SimState::Terminated {
            break;
        }
        if options.ticks.is_some_and(|limit| world.tick_count() >= limit) {
            break;
        }
        thread::sleep(poll);
    }
    sim.shutdown()?;

    if let Some(failure) = sim.failure() {
        return Err(AppError::Tick(failure));
    }
    let summary = RunSummary {
        ticks: world.tick_count(),
        live: world.live_count(),
    };
    log::info!("run finished: {} ticks, {} live", summary.ticks, summary.live);
    Ok(summary)
}
