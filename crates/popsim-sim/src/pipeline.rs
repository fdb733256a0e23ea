//! One tick, start to finish.
//!
//! 1. `pre_update` publishes the snapshot.
//! 2. The snapshot goes to the render thread.
//! 3. Every snapshot entity updates on the worker pool, one task each.
//! 4. Barrier: wait for the render and for every update task.
//! 5. `post_update` finalizes, promotes buffers and applies kills.
//!
//! Update writes only `future`, render reads only `current`, so steps 2 and
//! 3 overlap without sharing any mutable state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use popsim_core::Surface;

use crate::error::{BuildError, TickError};
use crate::render::RenderThread;
use crate::sync::lock;
use crate::world::{Snapshot, World};

/// Counters for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Index of the tick (0-based).
    pub tick: u64,
    /// Entities in the snapshot.
    pub entities: usize,
    /// Entities that went live at pre-update.
    pub spawned: usize,
    /// Behavior dispatches across all entities.
    pub behaviors_fired: usize,
    /// Render dispatches across all entities.
    pub renders_fired: usize,
    /// Live entities removed at post-update.
    pub killed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed(TickReport),
    /// The render never signalled completion; the tick was dropped before
    /// finalize and world state is as it was after update.
    Lost,
}

pub struct TickPipeline {
    world: Arc<World>,
    pool: rayon::ThreadPool,
    renderer: RenderThread,
}

impl TickPipeline {
    /// `worker_threads` sizes the update pool; `None` lets rayon decide.
    pub fn new(
        world: Arc<World>,
        surface: Box<dyn Surface>,
        worker_threads: Option<usize>,
    ) -> Result<Self, BuildError> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("update-worker-{i}"));
        if let Some(n) = worker_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;
        let renderer = RenderThread::spawn(surface)?;
        log::debug!(
            "tick pipeline ready with {} update workers",
            pool.current_num_threads()
        );
        Ok(Self {
            world,
            pool,
            renderer,
        })
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Run one full tick. Any script failure aborts the tick and is returned.
    pub fn run_tick(&self) -> Result<TickOutcome, TickError> {
        let pre = self.world.pre_update()?;
        let snapshot = pre.snapshot;

        let pending = self
            .renderer
            .submit(Arc::clone(&self.world), Arc::clone(&snapshot));
        let updated = self.update_all(&snapshot);

        // Barrier.
        let rendered = pending.wait();
        let behaviors_fired = updated?;
        let renders_fired = match rendered {
            Some(result) => result?,
            None => {
                log::warn!("render thread gone; dropping tick {}", snapshot.tick());
                return Ok(TickOutcome::Lost);
            }
        };

        let post = self.world.post_update(&snapshot)?;
        Ok(TickOutcome::Completed(TickReport {
            tick: snapshot.tick(),
            entities: snapshot.len(),
            spawned: pre.spawned,
            behaviors_fired,
            renders_fired,
            killed: post.killed,
        }))
    }

    fn update_all(&self, snapshot: &Snapshot) -> Result<usize, TickError> {
        let fired = AtomicUsize::new(0);
        let failure: Mutex<Option<TickError>> = Mutex::new(None);
        let world = &*self.world;

        self.pool.scope(|scope| {
            for entity in snapshot.iter() {
                let fired = &fired;
                let failure = &failure;
                scope.spawn(move |_| match entity.update(world) {
                    Ok(n) => {
                        fired.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => {
                        let mut first = lock(failure);
                        if first.is_none() {
                            *first = Some(e);
                        }
                    }
                });
            }
        });

        match failure.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(e) => Err(e),
            None => Ok(fired.into_inner()),
        }
    }
}
