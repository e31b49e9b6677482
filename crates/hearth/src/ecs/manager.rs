//! # EntityManager: Registry Plus Per-Type Storage
//!
//! The [`EntityManager`] is the single owner of entity identity and component
//! data. It composes an [`EntityRegistry`] with one type-erased
//! [`SparseSet`] per component type:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ EntityManager                                        │
//! │                                                      │
//! │  registry: EntityRegistry    (id, version) lifecycle │
//! │  storages: TypeId -> Box<dyn ComponentStorage>       │
//! │  active:   Vec<bool>         indexed by EntityId     │
//! │  names:    String <-> EntityHandle                   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every accessor takes an [`EntityHandle`] and validates it first, so a stale
//! handle always comes back as `None`/`false`.
//!
//! The manager does no lifecycle dispatch of its own. `set_active` flips the
//! flag only; the hooks are run by the
//! [`ComponentReflector`](super::reflect::ComponentReflector) on behalf of
//! [`GameWorld`](crate::world::GameWorld) and
//! [`GameObject`](crate::object::GameObject).

use std::any::TypeId;
use std::collections::HashMap;

use super::component::Component;
use super::entity::{EntityHandle, EntityId, EntityRegistry};
use super::filter::GameObjectFilter;
use super::sparse_set::{ComponentStorage, SparseSet, downcast_mut, downcast_ref};
use super::view::{ColumnGuard, Query, QueryMut, View};

/// Facade over entity identity and component storage.
pub struct EntityManager {
    registry: EntityRegistry,
    storages: HashMap<TypeId, Box<dyn ComponentStorage>>,
    active: Vec<bool>,
    names: HashMap<String, EntityHandle>,
    names_reverse: HashMap<EntityId, String>,
    /// Initial dense capacity for newly created sparse sets.
    set_capacity: usize,
    #[cfg(feature = "diagnostics")]
    spawned_this_frame: u32,
    #[cfg(feature = "diagnostics")]
    despawned_this_frame: u32,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a manager whose component sets start with room for
    /// `set_capacity` entries.
    pub fn with_capacity(set_capacity: usize) -> Self {
        Self {
            registry: EntityRegistry::new(),
            storages: HashMap::new(),
            active: Vec::new(),
            names: HashMap::new(),
            names_reverse: HashMap::new(),
            set_capacity,
            #[cfg(feature = "diagnostics")]
            spawned_this_frame: 0,
            #[cfg(feature = "diagnostics")]
            despawned_this_frame: 0,
        }
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Create an active entity with no components.
    pub fn create(&mut self) -> EntityHandle {
        let handle = self.registry.create();
        let slot = handle.id as usize;
        if slot >= self.active.len() {
            self.active.resize(slot + 1, false);
        }
        self.active[slot] = true;
        #[cfg(feature = "diagnostics")]
        {
            self.spawned_this_frame += 1;
        }
        handle
    }

    /// Create an entity that starts inactive (prefabs, pooled objects).
    pub fn create_inactive(&mut self) -> EntityHandle {
        let handle = self.create();
        self.active[handle.id as usize] = false;
        handle
    }

    /// Destroy an entity: drop all its components (removal guards are not
    /// consulted), forget its name and release its slot.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        if !self.registry.is_alive(handle) {
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.evict(handle.id);
        }
        if let Some(name) = self.names_reverse.remove(&handle.id) {
            self.names.remove(&name);
        }
        self.active[handle.id as usize] = false;
        self.registry.release(handle);
        #[cfg(feature = "diagnostics")]
        {
            self.despawned_this_frame += 1;
        }
        true
    }

    /// Destroy every live entity.
    pub fn clear(&mut self) {
        for handle in self.handles().collect::<Vec<_>>() {
            self.destroy(handle);
        }
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.registry.is_alive(handle)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.registry.alive_count()
    }

    /// Every live entity, in slot order.
    pub fn handles(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        (0..self.registry.total_slots() as EntityId).filter_map(|id| self.registry.current(id))
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Resolve a slot index to its live handle.
    pub(crate) fn current(&self, id: EntityId) -> Option<EntityHandle> {
        self.registry.current(id)
    }

    // ── Active Flag ──────────────────────────────────────────────────

    /// `false` for inactive and for dead entities.
    pub fn is_active(&self, handle: EntityHandle) -> bool {
        self.is_alive(handle) && self.active[handle.id as usize]
    }

    pub(crate) fn is_active_id(&self, id: EntityId) -> bool {
        self.active.get(id as usize).copied().unwrap_or(false)
    }

    /// Set the raw active flag without running any hooks.
    ///
    /// Returns the previous value, or `None` for a stale handle.
    pub fn set_active(&mut self, handle: EntityHandle, active: bool) -> Option<bool> {
        if !self.is_alive(handle) {
            return None;
        }
        let slot = &mut self.active[handle.id as usize];
        Some(std::mem::replace(slot, active))
    }

    // ── Components ───────────────────────────────────────────────────

    /// Attach `value` to the entity.
    ///
    /// Returns `None` if the handle is stale or the entity already has a `T`;
    /// in the duplicate case the stored value is left untouched. Lifecycle
    /// hooks are not run here; see [`GameObject::add`](crate::object::GameObject::add).
    pub fn emplace<T: Component>(&mut self, handle: EntityHandle, value: T) -> Option<&mut T> {
        if !self.is_alive(handle) {
            return None;
        }
        self.storage_or_insert::<T>().emplace(handle.id, value)
    }

    pub fn get<T: Component>(&self, handle: EntityHandle) -> Option<&T> {
        if !self.is_alive(handle) {
            return None;
        }
        self.storage::<T>()?.get(handle.id)
    }

    pub fn get_mut<T: Component>(&mut self, handle: EntityHandle) -> Option<&mut T> {
        if !self.is_alive(handle) {
            return None;
        }
        self.storage_mut::<T>()?.get_mut(handle.id)
    }

    pub fn has<T: Component>(&self, handle: EntityHandle) -> bool {
        self.get::<T>(handle).is_some()
    }

    /// Remove the entity's `T`, subject to the set's removal guard.
    ///
    /// Returns `false` if the handle is stale, the component is absent, or the
    /// guard vetoed the removal.
    pub fn remove<T: Component>(&mut self, handle: EntityHandle) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.storage_mut::<T>()
            .is_some_and(|set| set.remove(handle.id))
    }

    /// Install a removal guard on the `T` set (creating the set if needed).
    pub fn set_on_remove_callback<T: Component>(
        &mut self,
        guard: impl FnMut(&T) -> bool + 'static,
    ) {
        self.storage_or_insert::<T>().set_on_remove_callback(guard);
    }

    pub fn clear_on_remove_callback<T: Component>(&mut self) {
        if let Some(set) = self.storage_mut::<T>() {
            set.clear_on_remove_callback();
        }
    }

    /// Enabled flag of the entity's `T`, `None` if absent.
    pub fn is_enabled<T: Component>(&self, handle: EntityHandle) -> Option<bool> {
        if !self.is_alive(handle) {
            return None;
        }
        self.storage::<T>()?.is_enabled(handle.id)
    }

    /// Set the enabled flag of the entity's `T`. Returns `false` if absent.
    pub fn set_enabled<T: Component>(&mut self, handle: EntityHandle, enabled: bool) -> bool {
        if !self.is_alive(handle) {
            return false;
        }
        self.storage_mut::<T>()
            .is_some_and(|set| set.set_enabled(handle.id, enabled))
    }

    pub fn enable<T: Component>(&mut self, handle: EntityHandle) -> bool {
        self.set_enabled::<T>(handle, true)
    }

    pub fn disable<T: Component>(&mut self, handle: EntityHandle) -> bool {
        self.set_enabled::<T>(handle, false)
    }

    /// Type ids of every component the entity currently has.
    pub fn component_types(&self, handle: EntityHandle) -> Vec<TypeId> {
        if !self.is_alive(handle) {
            return Vec::new();
        }
        self.storages
            .iter()
            .filter(|(_, storage)| storage.contains(handle.id))
            .map(|(&tid, _)| tid)
            .collect()
    }

    /// Name of the component type stored under `type_id`, if a set exists.
    pub fn type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.storages.get(&type_id).map(|s| s.type_name())
    }

    // ── Storage Access ───────────────────────────────────────────────

    /// The `T` set, if any `T` was ever stored.
    pub fn storage<T: Component>(&self) -> Option<&SparseSet<T>> {
        self.storages
            .get(&TypeId::of::<T>())
            .map(|s| downcast_ref::<T>(s.as_ref()))
    }

    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut SparseSet<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .map(|s| downcast_mut::<T>(s.as_mut()))
    }

    fn storage_or_insert<T: Component>(&mut self) -> &mut SparseSet<T> {
        let capacity = self.set_capacity;
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(SparseSet::<T>::with_capacity(capacity)));
        downcast_mut::<T>(storage.as_mut())
    }

    pub(crate) fn storages(&self) -> &HashMap<TypeId, Box<dyn ComponentStorage>> {
        &self.storages
    }

    // ── Names ────────────────────────────────────────────────────────

    /// Give an entity a unique name. Re-assigning its current name is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken or the handle is stale.
    pub fn name_entity(&mut self, handle: EntityHandle, name: &str) {
        assert!(self.is_alive(handle), "cannot name dead entity {:?}", handle);
        if let Some(&existing) = self.names.get(name) {
            if existing == handle {
                return;
            }
            panic!(
                "name \"{}\" is already used by {:?} (tried to assign to {:?})",
                name, existing, handle
            );
        }
        if let Some(old) = self.names_reverse.insert(handle.id, name.to_string()) {
            self.names.remove(&old);
        }
        self.names.insert(name.to_string(), handle);
    }

    /// The entity with the given name.
    ///
    /// # Panics
    ///
    /// Panics if no live entity has that name.
    pub fn named(&self, name: &str) -> EntityHandle {
        self.try_named(name)
            .unwrap_or_else(|| panic!("no entity named \"{}\"", name))
    }

    pub fn try_named(&self, name: &str) -> Option<EntityHandle> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, handle: EntityHandle) -> Option<&str> {
        if !self.is_alive(handle) {
            return None;
        }
        self.names_reverse.get(&handle.id).map(String::as_str)
    }

    // ── Views ────────────────────────────────────────────────────────

    /// Lazy view over entities with every component in `Q`, using the default
    /// filter (`ACTIVE | COMPONENT_ENABLED`).
    ///
    /// ```ignore
    /// for (entity, (pos, vel)) in manager.find::<(&Position, &Velocity)>() {
    ///     // read-only
    /// }
    /// ```
    pub fn find<Q: Query>(&self) -> View<'_, Q> {
        View::new(self, GameObjectFilter::default())
    }

    /// Like [`find`](Self::find) with an explicit filter.
    pub fn find_filtered<Q: Query>(&self, filter: GameObjectFilter) -> View<'_, Q> {
        View::new(self, filter)
    }

    /// Mutable pass over entities matching `Q` and `filter`.
    ///
    /// Storages touched by `Q` are moved out for the duration of the pass, so
    /// the closure cannot add or remove components or destroy entities; queue
    /// a command for that. Order follows the dense order of the first type.
    ///
    /// # Panics
    ///
    /// Panics if `Q` names the same component type twice. If `f` panics, the
    /// storages are put back before the panic propagates.
    pub fn each_mut<Q: QueryMut>(
        &mut self,
        filter: GameObjectFilter,
        mut f: impl FnMut(EntityHandle, Q::Item<'_>),
    ) {
        let type_ids = Q::type_ids();
        for (i, tid) in type_ids.iter().enumerate() {
            assert!(
                !type_ids[..i].contains(tid),
                "each_mut: query names the same component twice"
            );
        }
        if !type_ids.iter().all(|tid| self.storages.contains_key(tid)) {
            return;
        }

        let mut guard = ColumnGuard::<Q>::extract(&mut self.storages);
        let Some(cols) = guard.columns() else {
            return;
        };
        let driver = Q::driver_ids(cols);
        for id in driver {
            let Some(handle) = self.registry.current(id) else {
                continue;
            };
            let active = self.active.get(id as usize).copied().unwrap_or(false);
            if !filter.matches_active(active) || !Q::state_matches(cols, id, filter) {
                continue;
            }
            if let Some(item) = Q::fetch(cols, id) {
                f(handle, item);
            }
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    /// Entity-pool statistics; resets the per-frame spawn/despawn counters.
    #[cfg(feature = "diagnostics")]
    pub fn take_pool_stats(&mut self) -> crate::diag::EntityPoolStats {
        let stats = crate::diag::EntityPoolStats {
            total_slots: self.registry.total_slots(),
            free_count: self.registry.free_count(),
            alive_count: self.registry.alive_count(),
            component_types: self.storages.len(),
            spawned_this_frame: self.spawned_this_frame,
            despawned_this_frame: self.despawned_this_frame,
        };
        self.spawned_this_frame = 0;
        self.despawned_this_frame = 0;
        stats
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn create_emplace_remove_destroy_scenario() {
        let mut m = EntityManager::new();
        let e = m.create();
        assert_eq!((e.id(), e.version()), (0, 1));

        assert!(m.emplace(e, Health(10)).is_some());
        assert_eq!(m.get::<Health>(e).map(|h| h.0), Some(10));

        assert!(m.remove::<Health>(e));
        assert!(m.get::<Health>(e).is_none());

        let copy = e;
        assert!(m.destroy(e));
        assert!(!m.is_alive(copy));
    }

    #[test]
    fn stale_handle_misses_after_reuse() {
        let mut m = EntityManager::new();
        let old = m.create();
        m.emplace(old, Health(1));
        m.destroy(old);

        let new = m.create();
        m.emplace(new, Health(2));
        assert_eq!(old.id(), new.id());
        assert!(m.get::<Health>(old).is_none());
        assert!(!m.has::<Health>(old));
        assert!(m.emplace(old, Health(3)).is_none());
        assert!(!m.remove::<Health>(old));
        assert_eq!(m.get::<Health>(new), Some(&Health(2)));
    }

    #[test]
    fn duplicate_emplace_is_rejected() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(10));
        assert!(m.emplace(e, Health(20)).is_none());
        assert_eq!(m.get::<Health>(e), Some(&Health(10)));
    }

    #[test]
    fn destroy_drops_every_component_even_guarded() {
        let mut m = EntityManager::new();
        m.set_on_remove_callback::<Health>(|_| false);
        let e = m.create();
        m.emplace(e, Health(1));
        m.emplace(e, Position { x: 0.0, y: 0.0 });
        assert!(!m.remove::<Health>(e));
        assert!(m.destroy(e));
        assert_eq!(m.storage::<Health>().map(|s| s.len()), Some(0));
        assert_eq!(m.storage::<Position>().map(|s| s.len()), Some(0));
        assert!(!m.destroy(e));
    }

    #[test]
    fn guard_can_be_flipped_through_manager() {
        let allow = Rc::new(Cell::new(false));
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(10));
        let flag = Rc::clone(&allow);
        m.set_on_remove_callback::<Health>(move |_| flag.get());

        assert!(!m.remove::<Health>(e));
        assert_eq!(m.get::<Health>(e), Some(&Health(10)));
        allow.set(true);
        assert!(m.remove::<Health>(e));
        assert!(m.get::<Health>(e).is_none());
    }

    #[test]
    fn active_flag() {
        let mut m = EntityManager::new();
        let e = m.create();
        let p = m.create_inactive();
        assert!(m.is_active(e));
        assert!(!m.is_active(p));
        assert_eq!(m.set_active(e, false), Some(true));
        assert!(!m.is_active(e));
        m.destroy(p);
        assert_eq!(m.set_active(p, true), None);
        // Reused slot starts active regardless of the previous occupant.
        let reused = m.create();
        assert_eq!(reused.id(), p.id());
        assert!(m.is_active(reused));
    }

    #[test]
    fn enabled_flags() {
        let mut m = EntityManager::new();
        let e = m.create();
        assert_eq!(m.is_enabled::<Health>(e), None);
        m.emplace(e, Health(1));
        assert_eq!(m.is_enabled::<Health>(e), Some(true));
        assert!(m.disable::<Health>(e));
        assert_eq!(m.is_enabled::<Health>(e), Some(false));
        assert!(m.enable::<Health>(e));
        assert!(!m.disable::<Position>(e));
    }

    #[test]
    fn component_types_lists_present_types() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(1));
        m.emplace(e, Position { x: 1.0, y: 2.0 });
        let other = m.create();
        m.emplace(other, Velocity { dx: 0.0, dy: 0.0 });

        let mut types = m.component_types(e);
        types.sort();
        let mut expected = vec![TypeId::of::<Health>(), TypeId::of::<Position>()];
        expected.sort();
        assert_eq!(types, expected);
        assert!(m.type_name(TypeId::of::<Velocity>()).unwrap().ends_with("Velocity"));
    }

    #[test]
    fn each_mut_writes_in_place() {
        let mut m = EntityManager::new();
        let a = m.create();
        m.emplace(a, Position { x: 0.0, y: 0.0 });
        m.emplace(a, Velocity { dx: 1.0, dy: 2.0 });
        let b = m.create();
        m.emplace(b, Position { x: 5.0, y: 5.0 });

        m.each_mut::<(&mut Position, &Velocity)>(GameObjectFilter::default(), |_, (pos, vel)| {
            pos.x += vel.dx;
            pos.y += vel.dy;
        });

        assert_eq!(m.get::<Position>(a), Some(&Position { x: 1.0, y: 2.0 }));
        assert_eq!(m.get::<Position>(b), Some(&Position { x: 5.0, y: 5.0 }));
    }

    #[test]
    fn each_mut_respects_filter() {
        let mut m = EntityManager::new();
        let on = m.create();
        m.emplace(on, Health(1));
        let off = m.create();
        m.emplace(off, Health(1));
        m.set_active(off, false);
        let disabled = m.create();
        m.emplace(disabled, Health(1));
        m.disable::<Health>(disabled);

        m.each_mut::<&mut Health>(GameObjectFilter::default(), |_, h| h.0 += 1);
        assert_eq!(m.get::<Health>(on), Some(&Health(2)));
        assert_eq!(m.get::<Health>(off), Some(&Health(1)));
        assert_eq!(m.get::<Health>(disabled), Some(&Health(1)));

        m.each_mut::<&mut Health>(GameObjectFilter::ALL, |_, h| h.0 = 0);
        assert_eq!(m.get::<Health>(off), Some(&Health(0)));
        assert_eq!(m.get::<Health>(disabled), Some(&Health(0)));
    }

    #[test]
    fn each_mut_missing_storage_is_noop() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(1));
        let mut calls = 0;
        m.each_mut::<(&mut Health, &Velocity)>(GameObjectFilter::ALL, |_, _| calls += 1);
        assert_eq!(calls, 0);
        // Health storage was not lost.
        assert_eq!(m.get::<Health>(e), Some(&Health(1)));
    }

    #[test]
    #[should_panic(expected = "same component twice")]
    fn each_mut_duplicate_type_panics() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(1));
        m.each_mut::<(&mut Health, &Health)>(GameObjectFilter::ALL, |_, _| {});
    }

    #[test]
    fn names_are_cleaned_up_on_destroy() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.name_entity(e, "player");
        assert_eq!(m.named("player"), e);
        assert_eq!(m.name_of(e), Some("player"));
        m.destroy(e);
        assert!(m.try_named("player").is_none());
    }

    #[test]
    fn each_mut_restores_storages_when_closure_panics() {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(10));
        m.emplace(e, Position { x: 1.0, y: 1.0 });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            m.each_mut::<(&mut Health, &Position)>(GameObjectFilter::default(), |_, _| {
                panic!("system failed")
            });
        }));
        assert!(result.is_err());
        assert!(m.is_alive(e));
        assert_eq!(m.get::<Health>(e), Some(&Health(10)));
        assert_eq!(m.get::<Position>(e), Some(&Position { x: 1.0, y: 1.0 }));

        m.each_mut::<&mut Health>(GameObjectFilter::default(), |_, h| h.0 += 1);
        assert_eq!(m.get::<Health>(e), Some(&Health(11)));
    }

    #[test]
    fn renaming_to_current_name_is_noop() {
        let mut m = EntityManager::new();
        let boss = m.create();
        m.name_entity(boss, "boss");
        m.name_entity(boss, "boss");
        assert_eq!(m.named("boss"), boss);
        assert_eq!(m.name_of(boss), Some("boss"));
    }

    #[test]
    #[should_panic(expected = "already used")]
    fn duplicate_name_panics() {
        let mut m = EntityManager::new();
        let a = m.create();
        let b = m.create();
        m.name_entity(a, "hero");
        m.name_entity(b, "hero");
    }

    #[test]
    fn clear_and_handles() {
        let mut m = EntityManager::new();
        let a = m.create();
        let b = m.create();
        let c = m.create();
        m.destroy(b);
        assert_eq!(m.handles().collect::<Vec<_>>(), vec![a, c]);
        m.clear();
        assert_eq!(m.entity_count(), 0);
        assert_eq!(m.handles().count(), 0);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn pool_stats_reset_per_frame() {
        let mut m = EntityManager::new();
        let a = m.create();
        m.create();
        m.destroy(a);
        let stats = m.take_pool_stats();
        assert_eq!(stats.spawned_this_frame, 2);
        assert_eq!(stats.despawned_this_frame, 1);
        assert_eq!(stats.alive_count, 1);
        assert_eq!(stats.free_count, 1);
        let again = m.take_pool_stats();
        assert_eq!(again.spawned_this_frame, 0);
    }
}
