//! Real-time driver.
//!
//! A single `tick-scheduler` thread runs [`TickPipeline::run_tick`] at a fixed
//! rate. Control requests reach it over a channel and take effect between
//! ticks; a tick already in flight always runs to completion.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use popsim_core::{SimConfig, Surface};

use crate::error::{panic_message, BuildError, SimulationError, TickError};
use crate::pipeline::{TickOutcome, TickPipeline};
use crate::script::ScriptRegistry;
use crate::sync::lock;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    /// Built, never started.
    Idle,
    Running,
    Paused,
    /// Shut down, by request or after a failed tick. Final.
    Terminated,
}

enum Control {
    Pause,
    Resume,
    Shutdown,
}

pub struct Simulation {
    world: Arc<World>,
    interval: Duration,
    pipeline: Option<TickPipeline>,
    state: Arc<Mutex<SimState>>,
    failure: Arc<Mutex<Option<Arc<TickError>>>>,
    control: Option<mpsc::Sender<Control>>,
    ticker: Option<JoinHandle<()>>,
}

impl Simulation {
    /// Build the world and pipeline. No thread ticks until [`Simulation::begin`].
    pub fn new(
        config: &SimConfig,
        registry: &ScriptRegistry,
        surface: Box<dyn Surface>,
    ) -> Result<Self, BuildError> {
        let interval = config.tick_interval()?;
        let world = Arc::new(World::new(config, registry)?);
        let pipeline = TickPipeline::new(Arc::clone(&world), surface, config.worker_threads)?;
        Ok(Self {
            world,
            interval,
            pipeline: Some(pipeline),
            state: Arc::new(Mutex::new(SimState::Idle)),
            failure: Arc::new(Mutex::new(None)),
            control: None,
            ticker: None,
        })
    }

    /// Initialize the world and start ticking immediately.
    pub fn begin(&mut self) -> Result<(), SimulationError> {
        let mut state = lock(&self.state);
        match *state {
            SimState::Idle => {}
            SimState::Terminated => return Err(SimulationError::Terminated),
            SimState::Running | SimState::Paused => return Err(SimulationError::AlreadyStarted),
        }
        let pipeline = self.pipeline.take().ok_or(SimulationError::AlreadyStarted)?;
        if let Err(e) = self.world.init() {
            *state = SimState::Terminated;
            return Err(e.into());
        }

        let (tx, rx) = mpsc::channel();
        let ticker = Ticker {
            pipeline,
            interval: self.interval,
            control: rx,
            state: Arc::clone(&self.state),
            failure: Arc::clone(&self.failure),
        };
        let handle = thread::Builder::new()
            .name("tick-scheduler".into())
            .spawn(move || ticker.run())
            .map_err(|e| {
                *state = SimState::Terminated;
                SimulationError::Thread(e)
            })?;

        *state = SimState::Running;
        self.control = Some(tx);
        self.ticker = Some(handle);
        log::info!("simulation started at {:?} per tick", self.interval);
        Ok(())
    }

    /// Stop scheduling ticks. Pausing while paused does nothing.
    pub fn pause(&self) -> Result<(), SimulationError> {
        self.transition(SimState::Running, SimState::Paused, Control::Pause)?;
        log::info!("simulation paused at tick {}", self.world.tick_count());
        Ok(())
    }

    /// Resume ticking, starting with an immediate tick.
    pub fn resume(&self) -> Result<(), SimulationError> {
        self.transition(SimState::Paused, SimState::Running, Control::Resume)?;
        log::info!("simulation resumed at tick {}", self.world.tick_count());
        Ok(())
    }

    fn transition(&self, from: SimState, to: SimState, command: Control) -> Result<(), SimulationError> {
        let mut state = lock(&self.state);
        if *state == to {
            return Ok(());
        }
        if *state != from {
            return Err(match *state {
                SimState::Idle => SimulationError::NotStarted,
                _ => SimulationError::Terminated,
            });
        }
        if let Some(control) = &self.control {
            // A send can only fail if the ticker already exited, which it
            // does after marking the state terminated.
            let _ = control.send(command);
        }
        *state = to;
        Ok(())
    }

    /// Stop ticking, wait for any tick in flight, and release the worker
    /// pool and render thread. Safe to call more than once.
    pub fn shutdown(&mut self) -> Result<(), SimulationError> {
        *lock(&self.state) = SimState::Terminated;
        if let Some(control) = self.control.take() {
            let _ = control.send(Control::Shutdown);
        }
        self.pipeline = None;
        if let Some(handle) = self.ticker.take() {
            handle.join().map_err(|_| SimulationError::TickerPanicked)?;
            log::info!("simulation shut down after {} ticks", self.world.tick_count());
        }
        Ok(())
    }

    pub fn state(&self) -> SimState {
        *lock(&self.state)
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SimState::Paused
    }

    /// The error that stopped the simulation, if one did.
    pub fn failure(&self) -> Option<Arc<TickError>> {
        lock(&self.failure).clone()
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn tick_interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("shutdown on drop failed: {e}");
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state())
            .field("interval", &self.interval)
            .field("world", &self.world)
            .finish()
    }
}

/// Owned by the `tick-scheduler` thread.
struct Ticker {
    pipeline: TickPipeline,
    interval: Duration,
    control: mpsc::Receiver<Control>,
    state: Arc<Mutex<SimState>>,
    failure: Arc<Mutex<Option<Arc<TickError>>>>,
}

impl Ticker {
    fn run(self) {
        let mut running = true;
        let mut next_tick_time = Instant::now();

        loop {
            let command = if running {
                self.next_command(next_tick_time)
            } else {
                Some(self.control.recv().unwrap_or(Control::Shutdown))
            };

            match command {
                Some(Control::Pause) => running = false,
                Some(Control::Resume) => {
                    if !running {
                        running = true;
                        next_tick_time = Instant::now();
                    }
                }
                Some(Control::Shutdown) => break,
                None => {
                    if !self.tick() {
                        break;
                    }
                    next_tick_time += self.interval;
                    let now = Instant::now();
                    if now > next_tick_time + self.interval * 2 {
                        // Too far behind; skip ahead rather than burst.
                        next_tick_time = now;
                    }
                }
            }
        }
        log::debug!("tick scheduler exiting");
    }

    /// Wait for a control message until the next tick is due. `None` means
    /// it is time to tick.
    fn next_command(&self, next_tick_time: Instant) -> Option<Control> {
        let now = Instant::now();
        if next_tick_time > now {
            match self.control.recv_timeout(next_tick_time - now) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Control::Shutdown),
            }
        } else {
            match self.control.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => Some(Control::Shutdown),
            }
        }
    }

    /// Run one tick. Returns false when the simulation must stop.
    fn tick(&self) -> bool {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.pipeline.run_tick()))
            .unwrap_or_else(|payload| Err(TickError::Panicked(panic_message(payload))));
        match result {
            Ok(TickOutcome::Completed(report)) => {
                log::debug!(
                    "tick {}: {} entities, {} updated, {} rendered, {} spawned, {} killed",
                    report.tick,
                    report.entities,
                    report.behaviors_fired,
                    report.renders_fired,
                    report.spawned,
                    report.killed
                );
                true
            }
            Ok(TickOutcome::Lost) => {
                log::warn!("tick lost; stopping simulation");
                *lock(&self.state) = SimState::Terminated;
                false
            }
            Err(e) => {
                log::error!("tick aborted, shutting down: {e}");
                *lock(&self.failure) = Some(Arc::new(e));
                *lock(&self.state) = SimState::Terminated;
                false
            }
        }
    }
}
