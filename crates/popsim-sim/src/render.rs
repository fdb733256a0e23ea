//! Render thread.
//!
//! The drawing surface is owned by one dedicated thread for the lifetime of
//! the pipeline. Each tick the pipeline hands it a snapshot and gets back a
//! handle to wait on; rendering reads only `current` positions, so it runs
//! concurrently with the update fan-out.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use popsim_core::Surface;

use crate::error::{panic_message, BuildError, TickError};
use crate::world::{Snapshot, World};

struct RenderJob {
    world: Arc<World>,
    snapshot: Arc<Snapshot>,
    done: mpsc::Sender<Result<usize, TickError>>,
}

/// Completion signal for one submitted frame.
pub(crate) struct PendingRender {
    done: mpsc::Receiver<Result<usize, TickError>>,
}

impl PendingRender {
    /// Block until the frame is drawn. `None` means the render thread is
    /// gone and the frame will never complete.
    pub(crate) fn wait(self) -> Option<Result<usize, TickError>> {
        self.done.recv().ok()
    }
}

pub(crate) struct RenderThread {
    jobs: Option<mpsc::Sender<RenderJob>>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub(crate) fn spawn(surface: Box<dyn Surface>) -> Result<Self, BuildError> {
        let (jobs, rx) = mpsc::channel::<RenderJob>();
        let handle = thread::Builder::new()
            .name("render".into())
            .spawn(move || run(rx, surface))
            .map_err(|source: io::Error| BuildError::Thread {
                name: "render",
                source,
            })?;
        Ok(Self {
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, world: Arc<World>, snapshot: Arc<Snapshot>) -> PendingRender {
        let (done, rx) = mpsc::channel();
        if let Some(jobs) = &self.jobs {
            // On failure the job (and its sender) drops, so `wait` sees a
            // disconnect.
            let _ = jobs.send(RenderJob {
                world,
                snapshot,
                done,
            });
        }
        PendingRender { done: rx }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("render thread panicked");
            }
        }
    }
}

fn run(jobs: mpsc::Receiver<RenderJob>, mut surface: Box<dyn Surface>) {
    while let Ok(job) = jobs.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            job.world.render(&job.snapshot, surface.as_mut())
        }))
        .unwrap_or_else(|payload| Err(TickError::Panicked(panic_message(payload))));
        let _ = job.done.send(result);
    }
    log::debug!("render thread exiting");
}
