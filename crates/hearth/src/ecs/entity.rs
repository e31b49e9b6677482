//! # Entity: Generational Handles
//!
//! An entity has no data of its own. It is a slot index ([`EntityId`]) paired
//! with a version counter ([`VersionId`]); component data lives in the
//! per-type [`SparseSet`](super::sparse_set::SparseSet)s and is addressed by
//! that pair.
//!
//! ## Why Versions?
//!
//! Slots are recycled. Without a version, a handle captured before a destroy
//! would silently resolve to whatever entity reuses the slot:
//!
//! ```text
//! 1. create()            -> EntityHandle { id: 5, version: 1 }
//! 2. saved = that handle
//! 3. destroy(saved)      -> slot 5 version becomes 2, slot 5 goes on the free list
//! 4. create()            -> EntityHandle { id: 5, version: 2 }
//! 5. lookup(saved)       -> version 1 != 2, "not found"
//! ```
//!
//! Version `0` is never issued; it means "never allocated". A fresh slot starts
//! at `1`. Versions only ever grow.
//!
//! ## Version Width
//!
//! Versions are `u32`. A slot that has been recycled `u32::MAX - 1` times is
//! *retired*: its version is parked at `u32::MAX` (never issued) and the slot is
//! never handed out again. That costs one slot per four billion reuses and
//! rules out the wrap-around alias a narrower or wrapping counter would allow.

use std::fmt;

/// Reusable slot index identifying an entity.
pub type EntityId = u32;

/// Per-slot generation counter. `0` means the slot was never allocated.
pub type VersionId = u32;

/// Version parked on a slot that can no longer be reused.
const RETIRED: VersionId = VersionId::MAX;

/// The only valid external reference to an entity: `(id, version)`.
///
/// A handle is *live* while the registry's version for `id` equals `version`.
/// Stale handles resolve to "not found", never to a different entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle {
    pub(crate) id: EntityId,
    pub(crate) version: VersionId,
}

impl EntityHandle {
    /// Build a handle from raw parts. Mostly useful in tests and tools; a
    /// hand-built handle is only live if the registry agrees.
    pub const fn from_raw(id: EntityId, version: VersionId) -> Self {
        Self { id, version }
    }

    /// Slot index.
    pub fn id(self) -> EntityId {
        self.id
    }

    /// Generation this handle was issued with.
    pub fn version(self) -> VersionId {
        self.version
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityHandle({}v{})", self.id, self.version)
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.id, self.version)
    }
}

/// One slot in the registry.
#[derive(Clone, Copy)]
struct Slot {
    version: VersionId,
    occupied: bool,
}

/// Allocates and recycles entity slots.
///
/// ## Memory Layout
///
/// ```text
/// slots:     [1*, 2, 1*, 3, 1*]   <- current version per slot, * = occupied
/// free_list: [1, 3]               <- released slots, versions already bumped
/// ```
///
/// `create` pops the free list or appends a new slot at version 1.
/// `release` bumps the slot's version and pushes the slot on the free list.
#[derive(Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free_list: Vec<EntityId>,
    alive: usize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle, reusing a released slot when one is available.
    ///
    /// # Panics
    ///
    /// Panics if all `u32::MAX` slots are in use.
    pub fn create(&mut self) -> EntityHandle {
        self.alive += 1;
        if let Some(id) = self.free_list.pop() {
            // Version was bumped on release.
            let slot = &mut self.slots[id as usize];
            slot.occupied = true;
            EntityHandle { id, version: slot.version }
        } else {
            let id = EntityId::try_from(self.slots.len())
                .ok()
                .filter(|&id| id != EntityId::MAX)
                .unwrap_or_else(|| panic!("entity id space exhausted"));
            self.slots.push(Slot {
                version: 1,
                occupied: true,
            });
            EntityHandle { id, version: 1 }
        }
    }

    /// Check whether `handle` still refers to the entity it was issued for.
    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.slots
            .get(handle.id as usize)
            .is_some_and(|s| s.occupied && s.version == handle.version)
    }

    /// Invalidate `handle` and make its slot available for reuse.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn release(&mut self, handle: EntityHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.alive -= 1;
        let slot = &mut self.slots[handle.id as usize];
        slot.occupied = false;
        slot.version += 1;
        if slot.version == RETIRED {
            log::debug!("entity slot {} exhausted its versions and is retired", handle.id);
        } else {
            self.free_list.push(handle.id);
        }
        true
    }

    /// The live handle currently occupying slot `id`, if any.
    pub fn current(&self, id: EntityId) -> Option<EntityHandle> {
        let slot = self.slots.get(id as usize)?;
        slot.occupied.then_some(EntityHandle {
            id,
            version: slot.version,
        })
    }

    /// Number of live entities.
    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Number of released slots waiting for reuse.
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    /// Number of slots ever allocated.
    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn force_version(&mut self, id: EntityId, version: VersionId) {
        self.slots[id as usize].version = version;
    }
}
