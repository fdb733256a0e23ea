//! Periodic population report.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use popsim_sim::{PeriodicScript, ScriptResult, World};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CensusReport {
    /// Completed ticks when the count was taken.
    pub tick: u64,
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Counts the entities in the current snapshot and logs the result.
#[derive(Debug, Default)]
pub struct Census {
    latest: Mutex<Option<CensusReport>>,
}

impl Census {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent report, if the census has run.
    pub fn latest(&self) -> Option<CensusReport> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn count(world: &World) -> CensusReport {
        let snapshot = world.snapshot();
        let mut by_type = BTreeMap::new();
        for entity in snapshot.iter() {
            *by_type
                .entry(entity.entity_type().name().to_owned())
                .or_insert(0) += 1;
        }
        CensusReport {
            tick: world.tick_count(),
            total: snapshot.len(),
            by_type,
        }
    }
}

impl PeriodicScript for Census {
    fn run(&self, world: &World) -> ScriptResult {
        let report = Self::count(world);
        log::info!(
            "census at tick {}: {} live {:?}",
            report.tick,
            report.total,
            report.by_type
        );
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);
        Ok(())
    }
}
