//! # GameWorld: The Frame Driver's Entry Point
//!
//! [`GameWorld`] owns everything a frame touches:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ GameWorld                                                │
//! │                                                          │
//! │  entities:  EntityManager        handles + storages      │
//! │  reflector: ComponentReflector   clone/lifecycle table   │
//! │  commands:  CommandBuffer        deferred mutations      │
//! │  dispatch:  DispatchTable        typed command handlers  │
//! │  pools:     name -> ObjectPool   recycled entities       │
//! │  resources: TypeId -> Box<Any>   singletons (Score, ...) │
//! │  config:    WorldConfig                                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Structural operations that should run lifecycle hooks (`destroy`,
//! `set_active`, `instantiate`, pool `acquire`/`release`) live here rather
//! than on the manager, because only the world holds both the storages and
//! the reflector.
//!
//! ## Frame shape
//!
//! ```text
//! schedule.run(&mut world)
//!   PreUpdate systems  -> world.flush_commands()
//!   Update systems     -> world.flush_commands()
//!   PostUpdate systems -> world.flush_commands()
//! world.take_frame_stats()        (diagnostics)
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::command::{CommandBuffer, FlushStats};
use crate::config::WorldConfig;
use crate::dispatch::{DispatchTable, TypedDispatcher};
use crate::ecs::{
    ComponentReflector, EntityHandle, EntityManager, GameObjectFilter, Query, QueryMut, View,
};
use crate::object::GameObject;
use crate::pool::ObjectPool;

pub struct GameWorld {
    entities: EntityManager,
    reflector: ComponentReflector,
    commands: CommandBuffer,
    dispatch: DispatchTable,
    pools: HashMap<String, ObjectPool>,
    resources: HashMap<TypeId, Box<dyn Any>>,
    config: WorldConfig,
    #[cfg(feature = "diagnostics")]
    frame: crate::diag::FrameStats,
}

impl GameWorld {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        let mut reflector = ComponentReflector::new();
        reflector.set_strict(config.strict_reflection);
        log::debug!("world created: {:?}", config);
        Self {
            entities: EntityManager::with_capacity(config.initial_capacity),
            reflector,
            commands: CommandBuffer::new(),
            dispatch: DispatchTable::new(),
            pools: HashMap::new(),
            resources: HashMap::new(),
            config,
            #[cfg(feature = "diagnostics")]
            frame: crate::diag::FrameStats::default(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Run the one-shot component registration. Returns `false` if it already ran.
    ///
    /// ```ignore
    /// world.register_components(|r| {
    ///     r.register_type::<Health>();
    ///     r.register_type::<Velocity>();
    /// });
    /// ```
    pub fn register_components(&mut self, register: impl FnOnce(&mut ComponentReflector)) -> bool {
        self.reflector.bootstrap(register)
    }

    pub fn reflector(&self) -> &ComponentReflector {
        &self.reflector
    }

    pub fn reflector_mut(&mut self) -> &mut ComponentReflector {
        &mut self.reflector
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Raw manager access. Mutations here bypass lifecycle hooks.
    pub fn entities_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    // ── Entities ─────────────────────────────────────────────────────

    pub fn spawn(&mut self) -> EntityHandle {
        self.entities.create()
    }

    pub fn spawn_inactive(&mut self) -> EntityHandle {
        self.entities.create_inactive()
    }

    /// Spawn and name an entity.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken.
    pub fn spawn_named(&mut self, name: &str) -> EntityHandle {
        let entity = self.entities.create();
        self.entities.name_entity(entity, name);
        entity
    }

    /// Facade over a live entity; `None` for a stale handle.
    pub fn object(&mut self, handle: EntityHandle) -> Option<GameObject<'_>> {
        if !self.entities.is_alive(handle) {
            return None;
        }
        Some(GameObject::new(&mut self.entities, &self.reflector, handle))
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.entities.is_alive(handle)
    }

    pub fn is_active(&self, handle: EntityHandle) -> bool {
        self.entities.is_active(handle)
    }

    /// Destroy an entity, running deactivate hooks if it was active.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        self.reflector.destroy(&mut self.entities, handle)
    }

    /// Flip the active flag with hooks. Returns `true` on a change.
    pub fn set_active(&mut self, handle: EntityHandle, active: bool) -> bool {
        self.reflector.set_active(&mut self.entities, handle, active)
    }

    /// Clone a prefab onto a new active entity.
    ///
    /// # Panics
    ///
    /// Panics if `prefab` is not alive.
    pub fn instantiate(&mut self, prefab: EntityHandle) -> EntityHandle {
        self.reflector.instantiate(&mut self.entities, prefab)
    }

    /// Clone a prefab onto a new inactive entity.
    ///
    /// # Panics
    ///
    /// Panics if `prefab` is not alive.
    pub fn instantiate_inactive(&mut self, prefab: EntityHandle) -> EntityHandle {
        self.reflector.instantiate_inactive(&mut self.entities, prefab)
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn find<Q: Query>(&self) -> View<'_, Q> {
        self.entities.find::<Q>()
    }

    pub fn find_filtered<Q: Query>(&self, filter: GameObjectFilter) -> View<'_, Q> {
        self.entities.find_filtered::<Q>(filter)
    }

    pub fn each_mut<Q: QueryMut>(
        &mut self,
        filter: GameObjectFilter,
        f: impl FnMut(EntityHandle, Q::Item<'_>),
    ) {
        self.entities.each_mut::<Q>(filter, f);
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// The world's own command buffer, flushed by [`flush_commands`](Self::flush_commands).
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    /// Apply the world's command buffer.
    ///
    /// Commands queued by world commands during this flush are kept for the
    /// next one.
    pub fn flush_commands(&mut self) -> FlushStats {
        let mut buffer = std::mem::take(&mut self.commands);
        let stats = buffer.flush(self);
        buffer.append(&mut self.commands);
        self.commands = buffer;
        #[cfg(feature = "diagnostics")]
        {
            self.frame.commands_executed += stats.executed;
            self.frame.commands_skipped += stats.skipped;
        }
        stats
    }

    /// Handle commands of type `C` sent with [`CommandBuffer::send`].
    pub fn on_command<C: 'static>(&mut self, handler: impl FnMut(&mut GameObject<'_>, &C) + 'static) {
        self.dispatch.on(handler);
    }

    pub fn add_dispatcher<C: 'static>(&mut self, dispatcher: TypedDispatcher<C>) {
        self.dispatch.register(dispatcher);
    }

    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    /// Route a type-erased command to its handler. `false` if none matched.
    pub(crate) fn dispatch_command(
        &mut self,
        target: EntityHandle,
        type_id: TypeId,
        payload: &dyn Any,
    ) -> bool {
        if !self.entities.is_alive(target) {
            return false;
        }
        let mut object = GameObject::new(&mut self.entities, &self.reflector, target);
        self.dispatch.dispatch(&mut object, type_id, payload)
    }

    // ── Pools ────────────────────────────────────────────────────────

    /// Create a pool that clones `prefab`. Returns `false` if the name is taken.
    pub fn create_pool(&mut self, name: &str, prefab: EntityHandle) -> bool {
        if self.pools.contains_key(name) {
            log::warn!("pool \"{}\" already exists", name);
            return false;
        }
        self.pools.insert(name.to_string(), ObjectPool::new(name, prefab));
        true
    }

    pub fn pool(&self, name: &str) -> Option<&ObjectPool> {
        self.pools.get(name)
    }

    /// Clone `count` parked entities into the pool. `false` for an unknown pool.
    pub fn prewarm_pool(&mut self, name: &str, count: usize) -> bool {
        let Some(pool) = self.pools.get_mut(name) else {
            return false;
        };
        pool.prewarm(&mut self.entities, &self.reflector, count);
        true
    }

    /// Take an active entity from the pool.
    ///
    /// `None` for an unknown pool, or when the pool has nothing parked and
    /// its prefab has been destroyed.
    pub fn acquire(&mut self, pool: &str) -> Option<EntityHandle> {
        self.pools
            .get_mut(pool)?
            .acquire(&mut self.entities, &self.reflector)
    }

    /// Live entities handed out by the pool and not yet released. `None` for
    /// an unknown pool.
    pub fn pool_outstanding(&self, name: &str) -> Option<usize> {
        self.pools.get(name).map(|p| p.outstanding(&self.entities))
    }

    /// Park `entity` back in the pool.
    pub fn release(&mut self, pool: &str, entity: EntityHandle) -> bool {
        self.pools
            .get_mut(pool)
            .is_some_and(|p| p.release(&mut self.entities, &self.reflector, entity))
    }

    /// Drop a pool, destroying its parked entities.
    pub fn remove_pool(&mut self, name: &str) -> bool {
        let Some(mut pool) = self.pools.remove(name) else {
            return false;
        };
        pool.clear(&mut self.entities, &self.reflector);
        true
    }

    // ── Resources ────────────────────────────────────────────────────

    pub fn insert_resource<T: 'static>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// # Panics
    ///
    /// Panics if the resource hasn't been inserted.
    pub fn resource<T: 'static>(&self) -> &T {
        self.get_resource::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    /// # Panics
    ///
    /// Panics if the resource hasn't been inserted.
    pub fn resource_mut<T: 'static>(&mut self) -> &mut T {
        self.get_resource_mut::<T>().unwrap_or_else(|| {
            panic!(
                "Resource `{}` not found. Did you forget to insert it?",
                std::any::type_name::<T>()
            )
        })
    }

    pub fn get_resource<T: 'static>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|r| r.downcast_ref::<T>())
    }

    pub fn get_resource_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|r| r.downcast_mut::<T>())
    }

    pub fn has_resource<T: 'static>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    pub fn remove_resource<T: 'static>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|r| r.downcast::<T>().ok())
            .map(|b| *b)
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    #[cfg(feature = "diagnostics")]
    pub(crate) fn record_system_timing(&mut self, timing: crate::diag::SystemTiming) {
        self.frame.systems.push(timing);
    }

    /// Snapshot and reset everything recorded since the last call.
    #[cfg(feature = "diagnostics")]
    pub fn take_frame_stats(&mut self) -> crate::diag::FrameStats {
        let next_frame = self.frame.frame + 1;
        let mut stats = std::mem::take(&mut self.frame);
        stats.entities = self.entities.take_pool_stats();
        self.frame.frame = next_frame;
        stats
    }
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Despawn, Insert};
    use crate::ecs::Component;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Score(u32);

    struct Hit(i32);

    fn world() -> GameWorld {
        let mut w = GameWorld::new();
        w.register_components(|r| {
            r.register_type::<Health>();
        });
        w
    }

    #[test]
    fn register_components_is_one_shot() {
        let mut w = world();
        assert!(!w.register_components(|_| panic!("must not run twice")));
        assert_eq!(w.reflector().len(), 1);
    }

    #[test]
    fn object_rejects_stale_handles() {
        let mut w = world();
        let e = w.spawn();
        assert!(w.object(e).is_some());
        w.destroy(e);
        assert!(w.object(e).is_none());
    }

    #[test]
    fn commands_queued_during_flush_wait_for_next_flush() {
        let mut w = world();
        let e = w.spawn();
        w.commands().add_world_fn(move |w| {
            w.commands().add(e, Insert(Health(1)));
        });

        let first = w.flush_commands();
        assert_eq!(first.executed, 1);
        assert!(!w.entities().has::<Health>(e));
        assert_eq!(w.commands().len(), 1);

        let second = w.flush_commands();
        assert_eq!(second.executed, 1);
        assert!(w.entities().has::<Health>(e));
        assert!(w.commands().is_empty());
    }

    #[test]
    fn flush_routes_sent_commands() {
        let mut w = world();
        let e = w.spawn();
        w.entities_mut().emplace(e, Health(10));
        w.on_command::<Hit>(|obj, hit| {
            if let Some(h) = obj.get_mut::<Health>() {
                h.0 -= hit.0;
            }
        });

        w.commands().send(e, Hit(3));
        w.commands().send(e, Hit(4));
        w.commands().add(e, Despawn);
        w.commands().send(e, Hit(100));
        let stats = w.flush_commands();

        assert_eq!(stats, FlushStats { executed: 3, skipped: 1 });
        assert!(!w.is_alive(e));
    }

    #[test]
    fn pools_through_world() {
        let mut w = world();
        let prefab = w.spawn_inactive();
        w.entities_mut().emplace(prefab, Health(50));
        assert!(w.create_pool("enemies", prefab));
        assert!(!w.create_pool("enemies", prefab));
        assert!(w.acquire("missing").is_none());

        let a = w.acquire("enemies").unwrap();
        assert!(w.is_active(a));
        assert_eq!(w.entities().get::<Health>(a), Some(&Health(50)));
        assert!(w.release("enemies", a));
        assert!(!w.is_active(a));
        assert_eq!(w.pool("enemies").map(|p| p.available()), Some(1));

        assert!(w.prewarm_pool("enemies", 2));
        assert!(w.remove_pool("enemies"));
        assert!(!w.is_alive(a));
        assert!(w.is_alive(prefab));
    }

    #[test]
    fn pool_never_hands_out_its_prefab() {
        let mut w = world();
        let prefab = w.spawn_inactive();
        w.entities_mut().emplace(prefab, Health(50));
        w.create_pool("enemies", prefab);

        assert!(!w.release("enemies", prefab));
        let a = w.acquire("enemies").unwrap();
        assert_ne!(a, prefab);
        assert!(!w.is_active(prefab));
        assert_eq!(w.pool_outstanding("enemies"), Some(1));

        w.destroy(a);
        assert_eq!(w.pool_outstanding("enemies"), Some(0));
        w.destroy(prefab);
        assert!(w.acquire("enemies").is_none());
    }

    #[test]
    fn resources() {
        let mut w = world();
        assert!(!w.has_resource::<Score>());
        w.insert_resource(Score(0));
        w.resource_mut::<Score>().0 += 5;
        assert_eq!(w.resource::<Score>(), &Score(5));
        assert_eq!(w.remove_resource::<Score>(), Some(Score(5)));
        assert!(w.get_resource::<Score>().is_none());
    }

    #[test]
    #[should_panic(expected = "Did you forget to insert it?")]
    fn missing_resource_panics() {
        let w = world();
        w.resource::<Score>();
    }

    #[test]
    fn strict_config_reaches_reflector() {
        let w = GameWorld::with_config(WorldConfig {
            strict_reflection: true,
            ..WorldConfig::default()
        });
        assert!(w.reflector().is_strict());
    }

    #[test]
    fn named_spawn() {
        let mut w = world();
        let e = w.spawn_named("boss");
        assert_eq!(w.entities().named("boss"), e);
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn frame_stats_accumulate_and_reset() {
        let mut w = world();
        let e = w.spawn();
        w.commands().add(e, Despawn);
        w.flush_commands();

        let stats = w.take_frame_stats();
        assert_eq!(stats.frame, 0);
        assert_eq!(stats.commands_executed, 1);
        assert_eq!(stats.entities.spawned_this_frame, 1);
        assert_eq!(stats.entities.despawned_this_frame, 1);

        let next = w.take_frame_stats();
        assert_eq!(next.frame, 1);
        assert_eq!(next.commands_executed, 0);
    }
}
