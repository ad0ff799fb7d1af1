//! Tracked entities and update deduplication
//!
//! The tracked set is exclusively owned by the orchestrator engine: it is
//! replaced wholesale when the caller changes what it tracks, read as a
//! snapshot by the transports, and mutated only by the engine's dispatch loop
//! after a dispatched update (single-writer discipline).

use std::collections::HashMap;

/// One externally-defined booking whose status is mirrored locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    pub id: i64,
    pub last_known_status: String,
}

impl TrackedEntity {
    pub fn new(id: i64, last_known_status: impl Into<String>) -> Self {
        Self {
            id,
            last_known_status: last_known_status.into(),
        }
    }
}

/// The set of tracked entities and their last known statuses
#[derive(Debug, Clone, Default)]
pub struct TrackedSet {
    entities: HashMap<i64, String>,
}

impl TrackedSet {
    pub fn new(entities: impl IntoIterator<Item = TrackedEntity>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.id, e.last_known_status))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Tracked ids in ascending order — the iteration order polling ticks use
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn status_of(&self, id: i64) -> Option<&str> {
        self.entities.get(&id).map(String::as_str)
    }

    /// Whether an observed status is novel and must reach the caller.
    ///
    /// True iff the entity is tracked and the status differs case-sensitively
    /// from its last known value. Read-only: a dispatched update must be
    /// followed by [`commit`](Self::commit) before the next observation.
    pub fn should_dispatch(&self, id: i64, new_status: &str) -> bool {
        match self.entities.get(&id) {
            Some(current) => current != new_status,
            None => false,
        }
    }

    /// Record a dispatched update as the new last known status
    pub fn commit(&mut self, id: i64, new_status: &str) {
        if let Some(current) = self.entities.get_mut(&id) {
            *current = new_status.to_string();
        }
    }
}
