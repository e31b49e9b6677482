//! Object pools: recycle inactive entities instead of destroying and
//! re-cloning them.
//!
//! A pool is a prefab handle plus a free list. `acquire` pops a free entity
//! (or clones the prefab when the list is empty), runs `on_acquire` and
//! activates it. `release` runs `on_release`, deactivates it and pushes it
//! back. Components are expected to reset themselves in those hooks.
//!
//! Pools live inside [`GameWorld`](crate::world::GameWorld) under a name; the
//! methods here take the manager and reflector explicitly so the pool can be
//! borrowed alongside them.

use std::collections::HashSet;

use crate::ecs::{ComponentReflector, EntityHandle, EntityManager};

pub struct ObjectPool {
    name: String,
    prefab: EntityHandle,
    free: Vec<EntityHandle>,
    /// Entities handed out by `acquire` and not yet released.
    handed_out: HashSet<EntityHandle>,
}

impl ObjectPool {
    pub fn new(name: impl Into<String>, prefab: EntityHandle) -> Self {
        Self {
            name: name.into(),
            prefab,
            free: Vec::new(),
            handed_out: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefab(&self) -> EntityHandle {
        self.prefab
    }

    /// Entities parked in the pool, ready to hand out.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Handed-out entities that are still alive. Entities destroyed while
    /// out of the pool are not counted.
    pub fn outstanding(&self, m: &EntityManager) -> usize {
        self.handed_out.iter().filter(|e| m.is_alive(**e)).count()
    }

    /// Clone the prefab `count` times into the free list.
    ///
    /// # Panics
    ///
    /// Panics if the prefab is not alive.
    pub fn prewarm(&mut self, m: &mut EntityManager, r: &ComponentReflector, count: usize) {
        for _ in 0..count {
            let instance = r.instantiate_inactive(m, self.prefab);
            self.free.push(instance);
        }
        log::debug!("pool \"{}\": prewarmed {} entities", self.name, count);
    }

    /// Hand out an active entity.
    ///
    /// Free entries destroyed behind the pool's back are discarded. Returns
    /// `None` if the free list is empty and the prefab is no longer alive.
    pub fn acquire(
        &mut self,
        m: &mut EntityManager,
        r: &ComponentReflector,
    ) -> Option<EntityHandle> {
        let entity = loop {
            match self.free.pop() {
                Some(e) if m.is_alive(e) => break e,
                Some(e) => log::debug!("pool \"{}\": dropping stale entry {}", self.name, e),
                None if m.is_alive(self.prefab) => break r.instantiate_inactive(m, self.prefab),
                None => {
                    log::warn!("pool \"{}\": prefab {} is dead", self.name, self.prefab);
                    return None;
                }
            }
        };
        r.acquire(m, entity);
        r.set_active(m, entity, true);
        self.handed_out.retain(|e| m.is_alive(*e));
        self.handed_out.insert(entity);
        Some(entity)
    }

    /// Return `entity` to the pool.
    ///
    /// Returns `false` if it is dead, or was not handed out by this pool
    /// (this covers the prefab and entities already parked).
    pub fn release(
        &mut self,
        m: &mut EntityManager,
        r: &ComponentReflector,
        entity: EntityHandle,
    ) -> bool {
        if entity == self.prefab || !m.is_alive(entity) || !self.handed_out.remove(&entity) {
            return false;
        }
        r.release(m, entity);
        r.set_active(m, entity, false);
        self.free.push(entity);
        true
    }

    /// Destroy every parked entity. Outstanding ones are left alone.
    pub fn clear(&mut self, m: &mut EntityManager, r: &ComponentReflector) {
        for entity in self.free.drain(..) {
            r.destroy(m, entity);
        }
    }
}
