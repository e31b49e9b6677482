//! # ComponentReflector: Lifecycle Dispatch Without a Shared Base
//!
//! Components don't share a trait object type, so there is no way to walk "every
//! component on this entity" and call a hook on each. The reflector fills that
//! gap: a table from [`TypeId`] to a small set of monomorphised function
//! pointers, built once at startup.
//!
//! ```text
//! register_type::<Health>()
//!         │
//!         ▼
//! ┌───────────────────────────────────────────────┐
//! │ TypeId(Health) -> ComponentOps {              │
//! │     name:        "game::Health",              │
//! │     clone_into:  clone_component::<Health>,   │
//! │     acquire:     |m, e| Health::on_acquire,   │
//! │     release:     ...                          │
//! │     activate:    ...                          │
//! │     deactivate:  ...                          │
//! │ }                                             │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Every operation walks the table in registration order, so hooks on one
//! entity always fire in the same order.
//!
//! ## Unregistered types
//!
//! A type that was never registered can't be cloned and never hears about
//! acquire/release/activate/deactivate. When one is found on an entity the
//! reflector logs a warning (once per type) and skips it. In strict mode it
//! panics instead, which is the right setting for tests and debug builds.
//!
//! ## Bootstrap
//!
//! [`bootstrap`](ComponentReflector::bootstrap) runs the registration closure
//! once; later calls are no-ops. Each [`GameWorld`](crate::world::GameWorld)
//! owns its own reflector, so there is no process-wide table to race on.

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::component::Component;
use super::entity::EntityHandle;
use super::manager::EntityManager;

type CloneFn = fn(&mut EntityManager, EntityHandle, EntityHandle) -> bool;
type HookFn = fn(&mut EntityManager, EntityHandle);

/// Function table for one registered component type.
pub struct ComponentOps {
    name: &'static str,
    clone_into: Option<CloneFn>,
    acquire: HookFn,
    release: HookFn,
    activate: HookFn,
    deactivate: HookFn,
}

impl ComponentOps {
    fn lifecycle<T: Component>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            clone_into: None,
            acquire: |m, e| {
                if let Some(c) = m.get_mut::<T>(e) {
                    c.on_acquire();
                }
            },
            release: |m, e| {
                if let Some(c) = m.get_mut::<T>(e) {
                    c.on_release();
                }
            },
            activate: |m, e| {
                if let Some(c) = m.get_mut::<T>(e) {
                    c.on_activate();
                }
            },
            deactivate: |m, e| {
                if let Some(c) = m.get_mut::<T>(e) {
                    c.on_deactivate();
                }
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Was the type registered with a clone operation?
    pub fn can_clone(&self) -> bool {
        self.clone_into.is_some()
    }
}

/// Copy `src`'s `T` onto `dst`, carrying the enabled flag and calling
/// `on_attach` on the copy.
fn clone_component<T: Component + Clone>(
    m: &mut EntityManager,
    src: EntityHandle,
    dst: EntityHandle,
) -> bool {
    let Some(value) = m.get::<T>(src).cloned() else {
        return false;
    };
    let enabled = m.is_enabled::<T>(src).unwrap_or(true);
    match m.emplace(dst, value) {
        Some(copy) => copy.on_attach(dst),
        None => return false,
    }
    if !enabled {
        m.set_enabled::<T>(dst, false);
    }
    true
}

/// Type registry for clone and lifecycle dispatch.
pub struct ComponentReflector {
    ops: HashMap<TypeId, ComponentOps>,
    /// Registration order; dispatch follows it.
    order: Vec<TypeId>,
    bootstrapped: bool,
    strict: bool,
    warned: RefCell<HashSet<TypeId>>,
}

impl ComponentReflector {
    pub fn new() -> Self {
        Self {
            ops: HashMap::new(),
            order: Vec::new(),
            bootstrapped: false,
            strict: false,
            warned: RefCell::new(HashSet::new()),
        }
    }

    /// Panic on unregistered types instead of warning.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Register `T` for cloning and lifecycle dispatch.
    ///
    /// Returns `false` if `T` was already registered; a lifecycle-only entry
    /// is upgraded with the clone operation.
    pub fn register_type<T: Component + Clone>(&mut self) -> bool {
        let fresh = self.register_lifecycle::<T>();
        if let Some(ops) = self.ops.get_mut(&TypeId::of::<T>()) {
            ops.clone_into = Some(clone_component::<T>);
        }
        fresh
    }

    /// Register `T` for lifecycle hooks only. Instances of `T` are skipped
    /// (with a debug log) when an entity is cloned.
    pub fn register_lifecycle<T: Component>(&mut self) -> bool {
        let tid = TypeId::of::<T>();
        if self.ops.contains_key(&tid) {
            return false;
        }
        log::debug!("reflector: registered {}", std::any::type_name::<T>());
        self.ops.insert(tid, ComponentOps::lifecycle::<T>());
        self.order.push(tid);
        true
    }

    /// Run `register` once. Returns `true` if it ran.
    pub fn bootstrap(&mut self, register: impl FnOnce(&mut Self)) -> bool {
        if self.bootstrapped {
            return false;
        }
        self.bootstrapped = true;
        register(self);
        log::info!("reflector: bootstrapped {} component types", self.order.len());
        true
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.bootstrapped
    }

    pub fn is_registered<T: Component>(&self) -> bool {
        self.ops.contains_key(&TypeId::of::<T>())
    }

    pub fn ops(&self, type_id: TypeId) -> Option<&ComponentOps> {
        self.ops.get(&type_id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registered type names, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.order.iter().map(|tid| self.ops[tid].name).collect()
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Clone every registered component on `src` onto `dst`.
    ///
    /// Components `dst` already has are left alone. Returns the number of
    /// components copied.
    pub fn clone_components(
        &self,
        m: &mut EntityManager,
        src: EntityHandle,
        dst: EntityHandle,
    ) -> usize {
        self.check_registered(m, src);
        let mut copied = 0;
        for tid in &self.order {
            let ops = &self.ops[tid];
            if !Self::present(m, *tid, src) {
                continue;
            }
            match ops.clone_into {
                Some(clone) => {
                    if clone(m, src, dst) {
                        copied += 1;
                    }
                }
                None => log::debug!("reflector: {} is not cloneable, skipped", ops.name),
            }
        }
        copied
    }

    /// Run `on_acquire` on every registered component of `handle`.
    pub fn acquire(&self, m: &mut EntityManager, handle: EntityHandle) {
        self.dispatch(m, handle, |ops| ops.acquire);
    }

    /// Run `on_release` on every registered component of `handle`.
    pub fn release(&self, m: &mut EntityManager, handle: EntityHandle) {
        self.dispatch(m, handle, |ops| ops.release);
    }

    pub fn activate(&self, m: &mut EntityManager, handle: EntityHandle) {
        self.dispatch(m, handle, |ops| ops.activate);
    }

    pub fn deactivate(&self, m: &mut EntityManager, handle: EntityHandle) {
        self.dispatch(m, handle, |ops| ops.deactivate);
    }

    fn dispatch(
        &self,
        m: &mut EntityManager,
        handle: EntityHandle,
        hook: impl Fn(&ComponentOps) -> HookFn,
    ) {
        if !m.is_alive(handle) {
            return;
        }
        self.check_registered(m, handle);
        for tid in &self.order {
            if Self::present(m, *tid, handle) {
                hook(&self.ops[tid])(m, handle);
            }
        }
    }

    fn present(m: &EntityManager, tid: TypeId, handle: EntityHandle) -> bool {
        m.storages()
            .get(&tid)
            .is_some_and(|s| s.contains(handle.id))
    }

    /// Warn about (or, in strict mode, panic on) components of `handle` whose
    /// type was never registered.
    fn check_registered(&self, m: &EntityManager, handle: EntityHandle) {
        for tid in m.component_types(handle) {
            if self.ops.contains_key(&tid) {
                continue;
            }
            let name = m.type_name(tid).unwrap_or("<unknown>");
            if self.strict {
                panic!(
                    "component type `{}` on {:?} is not registered with the reflector",
                    name, handle
                );
            }
            if self.warned.borrow_mut().insert(tid) {
                log::warn!(
                    "reflector: `{}` is not registered; clone and lifecycle hooks skip it",
                    name
                );
            }
        }
    }

    // ── Entity-level operations ──────────────────────────────────────

    /// Flip the active flag, running `on_activate`/`on_deactivate` only when
    /// the flag actually changes. Returns `true` on a change.
    pub fn set_active(&self, m: &mut EntityManager, handle: EntityHandle, active: bool) -> bool {
        match m.set_active(handle, active) {
            Some(previous) if previous != active => {
                if active {
                    self.activate(m, handle);
                } else {
                    self.deactivate(m, handle);
                }
                true
            }
            _ => false,
        }
    }

    /// Clone `prefab` onto a fresh inactive entity.
    ///
    /// # Panics
    ///
    /// Panics if `prefab` is not alive.
    pub fn instantiate_inactive(&self, m: &mut EntityManager, prefab: EntityHandle) -> EntityHandle {
        assert!(m.is_alive(prefab), "instantiate: prefab {:?} is not alive", prefab);
        let instance = m.create_inactive();
        let copied = self.clone_components(m, prefab, instance);
        log::trace!("instantiate: {:?} -> {:?} ({} components)", prefab, instance, copied);
        instance
    }

    /// Clone `prefab` onto a fresh entity and activate it.
    ///
    /// # Panics
    ///
    /// Panics if `prefab` is not alive.
    pub fn instantiate(&self, m: &mut EntityManager, prefab: EntityHandle) -> EntityHandle {
        let instance = self.instantiate_inactive(m, prefab);
        self.set_active(m, instance, true);
        instance
    }

    /// Destroy `handle`, running deactivate hooks first if it was active.
    pub fn destroy(&self, m: &mut EntityManager, handle: EntityHandle) -> bool {
        if m.is_active(handle) {
            self.deactivate(m, handle);
        }
        m.destroy(handle)
    }
}

impl Default for ComponentReflector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    thread_local! {
        static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(event: impl Into<String>) {
        EVENTS.with(|e| e.borrow_mut().push(event.into()));
    }

    fn take_events() -> Vec<String> {
        EVENTS.with(|e| std::mem::take(&mut *e.borrow_mut()))
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Health {
        hp: u32,
        owner: Option<EntityHandle>,
    }

    impl Component for Health {
        fn on_attach(&mut self, owner: EntityHandle) {
            self.owner = Some(owner);
        }
        fn on_acquire(&mut self) {
            record("health.acquire");
        }
        fn on_release(&mut self) {
            record("health.release");
        }
        fn on_activate(&mut self) {
            record("health.activate");
        }
        fn on_deactivate(&mut self) {
            record("health.deactivate");
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Speed(f32);

    impl Component for Speed {
        fn on_activate(&mut self) {
            record("speed.activate");
        }
    }

    /// Registered for lifecycle only.
    struct Handle(Rc<()>);

    impl Component for Handle {
        fn on_release(&mut self) {
            record("handle.release");
        }
    }

    #[derive(Clone)]
    struct Unlisted;
    impl Component for Unlisted {}

    fn reflector() -> ComponentReflector {
        let mut r = ComponentReflector::new();
        r.bootstrap(|r| {
            r.register_type::<Health>();
            r.register_type::<Speed>();
            r.register_lifecycle::<Handle>();
        });
        r
    }

    fn health(hp: u32) -> Health {
        Health { hp, owner: None }
    }

    #[test]
    fn bootstrap_runs_once() {
        let mut r = reflector();
        assert!(r.is_bootstrapped());
        let ran = r.bootstrap(|r| {
            r.register_type::<Unlisted>();
        });
        assert!(!ran);
        assert!(!r.is_registered::<Unlisted>());
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn double_registration_is_noop() {
        let mut r = reflector();
        assert!(!r.register_type::<Health>());
        assert_eq!(r.len(), 3);
        assert!(r.ops(TypeId::of::<Health>()).is_some_and(|o| o.can_clone()));
        assert!(!r.ops(TypeId::of::<Handle>()).is_some_and(|o| o.can_clone()));
    }

    #[test]
    fn clone_copies_values_and_flags() {
        let r = reflector();
        let mut m = EntityManager::new();
        let prefab = m.create_inactive();
        m.emplace(prefab, health(50));
        m.emplace(prefab, Speed(2.5));
        m.emplace(prefab, Handle(Rc::new(())));
        m.disable::<Speed>(prefab);

        let copy = m.create();
        let copied = r.clone_components(&mut m, prefab, copy);
        assert_eq!(copied, 2);
        assert_eq!(m.get::<Health>(copy).map(|h| h.hp), Some(50));
        assert_eq!(m.get::<Health>(copy).and_then(|h| h.owner), Some(copy));
        assert_eq!(m.is_enabled::<Speed>(copy), Some(false));
        assert!(!m.has::<Handle>(copy));
        // Source untouched.
        assert_eq!(m.get::<Health>(prefab).and_then(|h| h.owner), None);
    }

    #[test]
    fn clone_skips_components_already_present() {
        let r = reflector();
        let mut m = EntityManager::new();
        let src = m.create();
        m.emplace(src, health(1));
        let dst = m.create();
        m.emplace(dst, health(99));
        assert_eq!(r.clone_components(&mut m, src, dst), 0);
        assert_eq!(m.get::<Health>(dst).map(|h| h.hp), Some(99));
    }

    #[test]
    fn hooks_fire_in_registration_order() {
        let r = reflector();
        let mut m = EntityManager::new();
        let e = m.create_inactive();
        m.emplace(e, Speed(1.0));
        m.emplace(e, health(1));
        take_events();

        assert!(r.set_active(&mut m, e, true));
        assert_eq!(take_events(), vec!["health.activate", "speed.activate"]);

        // No change, no hooks.
        assert!(!r.set_active(&mut m, e, true));
        assert!(take_events().is_empty());

        assert!(r.set_active(&mut m, e, false));
        assert_eq!(take_events(), vec!["health.deactivate"]);
    }

    #[test]
    fn acquire_release_reach_registered_types() {
        let r = reflector();
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, health(1));
        m.emplace(e, Handle(Rc::new(())));
        take_events();

        r.acquire(&mut m, e);
        r.release(&mut m, e);
        assert_eq!(
            take_events(),
            vec!["health.acquire", "health.release", "handle.release"]
        );
    }

    #[test]
    fn unregistered_type_is_skipped_by_default() {
        let r = reflector();
        let mut m = EntityManager::new();
        let src = m.create();
        m.emplace(src, Unlisted);
        m.emplace(src, health(3));
        let dst = m.create();
        assert_eq!(r.clone_components(&mut m, src, dst), 1);
        assert!(!m.has::<Unlisted>(dst));
    }

    #[test]
    #[should_panic(expected = "not registered with the reflector")]
    fn unregistered_type_panics_in_strict_mode() {
        let mut r = reflector();
        r.set_strict(true);
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Unlisted);
        r.activate(&mut m, e);
    }

    #[test]
    fn instantiate_activates_copy_and_leaves_prefab() {
        let r = reflector();
        let mut m = EntityManager::new();
        let prefab = m.create_inactive();
        m.emplace(prefab, health(10));
        take_events();

        let a = r.instantiate(&mut m, prefab);
        let b = r.instantiate_inactive(&mut m, prefab);
        assert!(m.is_active(a));
        assert!(!m.is_active(b));
        assert!(!m.is_active(prefab));
        assert_eq!(take_events(), vec!["health.activate"]);
        assert_eq!(m.get::<Health>(b).and_then(|h| h.owner), Some(b));
    }

    #[test]
    #[should_panic(expected = "is not alive")]
    fn instantiate_dead_prefab_panics() {
        let r = reflector();
        let mut m = EntityManager::new();
        let prefab = m.create();
        m.destroy(prefab);
        r.instantiate(&mut m, prefab);
    }

    #[test]
    fn destroy_deactivates_active_entities_only() {
        let r = reflector();
        let mut m = EntityManager::new();
        let on = m.create();
        m.emplace(on, health(1));
        let off = m.create_inactive();
        m.emplace(off, health(1));
        take_events();

        assert!(r.destroy(&mut m, on));
        assert!(r.destroy(&mut m, off));
        assert_eq!(take_events(), vec!["health.deactivate"]);
        assert!(!r.destroy(&mut m, on));
    }

    #[test]
    fn names_follow_registration_order() {
        let r = reflector();
        let names = r.names();
        assert!(names[0].ends_with("Health"));
        assert!(names[1].ends_with("Speed"));
        assert!(names[2].ends_with("Handle"));
    }
}
