// src/piper/registry.rs

use std::collections::HashMap;

use crate::piper::Piper;
use crate::types::{JobId, PiperId};

/// Set of open pipers.
///
/// Entries are keyed by a never-reused [`PiperId`], so removing one piper
/// leaves every other id valid. Callers handling several events can remove
/// entries as they go without invalidating the rest.
#[derive(Debug, Default)]
pub struct PiperRegistry {
    pipers: HashMap<PiperId, Piper>,
    next_id: u64,
}

impl PiperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, piper: Piper) -> PiperId {
        let id = PiperId(self.next_id);
        self.next_id += 1;
        self.pipers.insert(id, piper);
        id
    }

    /// Remove a piper whose source reached end-of-stream.
    pub fn remove(&mut self, id: PiperId) -> Option<Piper> {
        self.pipers.remove(&id)
    }

    pub fn get_mut(&mut self, id: PiperId) -> Option<&mut Piper> {
        self.pipers.get_mut(&id)
    }

    pub fn contains(&self, id: PiperId) -> bool {
        self.pipers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pipers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipers.is_empty()
    }

    /// Snapshot of the current wait set, in registration order.
    pub fn ids(&self) -> Vec<PiperId> {
        let mut ids: Vec<PiperId> = self.pipers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of streams of `job` that are still open.
    pub fn open_for_job(&self, job: JobId) -> usize {
        self.pipers.values().filter(|p| p.job() == job).count()
    }
}
