//! Entity handle allocation and liveness tracking.
//!
//! The allocator hands out [`EntityId`] handles backed by a slot table:
//! a free list of indices, a per-slot generation counter, and the owning
//! archetype of every live entity. Despawning bumps the slot's generation,
//! so a handle held across a destroy fails the liveness check instead of
//! silently resolving to the slot's next occupant.

use crate::engine::error::WorldError;
use crate::engine::types::{make_entity, EntityId, Generation, IndexId, INDEX_CAP};

/// Slot-table allocator for entity handles.
///
/// ## Invariants
/// - `versions`, `alive` and `archetype_of` always have equal length.
/// - A handle is live iff its index is in bounds, its slot is marked alive,
///   and its generation matches the slot's current generation.
/// - Free slots are reissued in LIFO order with a bumped generation.
#[derive(Default)]
pub(crate) struct EntityAllocator {
    versions: Vec<Generation>,
    free_store: Vec<IndexId>,
    alive: Vec<bool>,
    archetype_of: Vec<usize>,
}

impl EntityAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grows the slot table so at least `additional` spawns succeed without
    /// further allocation.
    fn ensure_capacity(&mut self, additional: u32) -> Result<(), WorldError> {
        if additional == 0 {
            return Ok(());
        }

        let current = self.versions.len() as u64;
        let needed = current + additional as u64;
        let capacity = INDEX_CAP as u64 + 1;
        if needed > capacity {
            return Err(WorldError::Capacity { needed, capacity });
        }

        self.versions.resize(needed as usize, 0);
        self.alive.resize(needed as usize, false);
        self.archetype_of.resize(needed as usize, usize::MAX);
        for index in current..needed {
            self.free_store.push(index as IndexId);
        }
        Ok(())
    }

    /// Allocates a live handle located in archetype `archetype`.
    pub(crate) fn spawn(&mut self, archetype: usize) -> Result<EntityId, WorldError> {
        let index = match self.free_store.pop() {
            Some(index) => index,
            None => {
                self.ensure_capacity(1024)?;
                self.free_store
                    .pop()
                    .expect("capacity growth must yield a free slot")
            }
        };

        let slot = index as usize;
        self.alive[slot] = true;
        self.archetype_of[slot] = archetype;
        Ok(make_entity(index, self.versions[slot]))
    }

    /// Retires a handle. Returns `false` (and does nothing) for dead or
    /// stale handles, making double-destroy a silent no-op.
    pub(crate) fn despawn(&mut self, entity: EntityId) -> bool {
        let index = entity.index() as usize;
        match self.versions.get_mut(index) {
            Some(version)
                if *version == entity.generation()
                    && self.alive.get(index).copied().unwrap_or(false) =>
            {
                *version = version.wrapping_add(1);
                self.alive[index] = false;
                self.archetype_of[index] = usize::MAX;
                self.free_store.push(entity.index());
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `entity` is a live, current-generation handle.
    pub(crate) fn is_alive(&self, entity: EntityId) -> bool {
        let index = entity.index() as usize;
        index < self.versions.len()
            && self.alive[index]
            && self.versions[index] == entity.generation()
    }

    /// Index of the archetype owning `entity`, if the handle is live.
    pub(crate) fn archetype_of(&self, entity: EntityId) -> Option<usize> {
        if self.is_alive(entity) {
            Some(self.archetype_of[entity.index() as usize])
        } else {
            None
        }
    }

    /// Repoints a live entity at a different archetype (used by migration).
    pub(crate) fn set_archetype(&mut self, entity: EntityId, archetype: usize) {
        debug_assert!(
            self.is_alive(entity),
            "set_archetype on a dead or stale entity: {entity:?}"
        );
        let index = entity.index() as usize;
        if index < self.archetype_of.len() {
            self.archetype_of[index] = archetype;
        }
    }

    /// Number of live entities.
    pub(crate) fn live_count(&self) -> usize {
        self.alive.iter().filter(|&&alive| alive).count()
    }
}
