//! Handle-holding facade over one entity.
//!
//! A [`GameObject`] owns no component state. It pairs an [`EntityHandle`] with
//! a mutable borrow of the [`EntityManager`] and a shared borrow of the
//! [`ComponentReflector`], so gameplay code can write `obj.get::<Health>()`
//! instead of threading the handle through every call, and so that `add`,
//! `set_active` and `destroy` run the right lifecycle hooks.
//!
//! Obtain one from [`GameWorld::object`](crate::world::GameWorld::object), or
//! receive one inside a [`TargetedCommand`](crate::command::TargetedCommand).
//!
//! ```ignore
//! let mut player = world.object(handle).expect("player is alive");
//! player.add(Health(100));
//! player.get_mut::<Health>().unwrap().0 -= 10;
//! ```

use crate::ecs::{Component, ComponentReflector, EntityHandle, EntityManager};

/// Borrowing view of one entity.
pub struct GameObject<'w> {
    entities: &'w mut EntityManager,
    reflector: &'w ComponentReflector,
    handle: EntityHandle,
}

impl<'w> GameObject<'w> {
    pub(crate) fn new(
        entities: &'w mut EntityManager,
        reflector: &'w ComponentReflector,
        handle: EntityHandle,
    ) -> Self {
        Self {
            entities,
            reflector,
            handle,
        }
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    /// `false` once the entity has been destroyed through this or any other path.
    pub fn is_alive(&self) -> bool {
        self.entities.is_alive(self.handle)
    }

    // ── Components ───────────────────────────────────────────────────

    pub fn get<T: Component>(&self) -> Option<&T> {
        self.entities.get::<T>(self.handle)
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.entities.get_mut::<T>(self.handle)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.entities.has::<T>(self.handle)
    }

    /// Attach `component` and call its `on_attach` hook.
    ///
    /// Returns `None` (leaving the existing value alone) if the entity already
    /// has a `T`, or if it is dead.
    pub fn add<T: Component>(&mut self, component: T) -> Option<&mut T> {
        let handle = self.handle;
        let added = self.entities.emplace(handle, component)?;
        added.on_attach(handle);
        Some(added)
    }

    /// Builder form of [`add`](Self::add). Duplicates are dropped with a debug log.
    pub fn with<T: Component>(mut self, component: T) -> Self {
        if self.add(component).is_none() {
            log::debug!(
                "{:?} already has a {}, new value dropped",
                self.handle,
                std::any::type_name::<T>()
            );
        }
        self
    }

    /// Remove the `T`, subject to its set's removal guard.
    pub fn remove<T: Component>(&mut self) -> bool {
        self.entities.remove::<T>(self.handle)
    }

    pub fn is_enabled<T: Component>(&self) -> Option<bool> {
        self.entities.is_enabled::<T>(self.handle)
    }

    pub fn enable<T: Component>(&mut self) -> bool {
        self.entities.enable::<T>(self.handle)
    }

    pub fn disable<T: Component>(&mut self) -> bool {
        self.entities.disable::<T>(self.handle)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.entities.is_active(self.handle)
    }

    /// Flip the active flag, running activate/deactivate hooks on a change.
    pub fn set_active(&mut self, active: bool) -> bool {
        self.reflector.set_active(self.entities, self.handle, active)
    }

    /// Destroy the entity. The facade stays usable; every lookup misses afterwards.
    pub fn destroy(&mut self) -> bool {
        self.reflector.destroy(self.entities, self.handle)
    }

    pub fn name(&self) -> Option<&str> {
        self.entities.name_of(self.handle)
    }

    /// The underlying manager, for cross-entity reads and writes.
    pub fn entities(&mut self) -> &mut EntityManager {
        self.entities
    }

    pub fn reflector(&self) -> &ComponentReflector {
        self.reflector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Owned {
        owner: Option<EntityHandle>,
        active_events: u32,
    }

    impl Component for Owned {
        fn on_attach(&mut self, owner: EntityHandle) {
            self.owner = Some(owner);
        }
        fn on_activate(&mut self) {
            self.active_events += 1;
        }
        fn on_deactivate(&mut self) {
            self.active_events += 1;
        }
    }

    #[derive(Debug, PartialEq)]
    struct Score(u32);
    impl Component for Score {}

    fn owned() -> Owned {
        Owned {
            owner: None,
            active_events: 0,
        }
    }

    fn setup() -> (EntityManager, ComponentReflector) {
        let mut reflector = ComponentReflector::new();
        reflector.register_lifecycle::<Owned>();
        reflector.register_lifecycle::<Score>();
        (EntityManager::new(), reflector)
    }

    #[test]
    fn add_runs_on_attach() {
        let (mut m, r) = setup();
        let e = m.create();
        let mut obj = GameObject::new(&mut m, &r, e);
        assert_eq!(obj.add(owned()).and_then(|o| o.owner), Some(e));
        assert!(obj.add(owned()).is_none());
        assert!(obj.has::<Owned>());
    }

    #[test]
    fn builder_chain() {
        let (mut m, r) = setup();
        let e = m.create();
        let obj = GameObject::new(&mut m, &r, e)
            .with(Score(1))
            .with(Score(2))
            .with(owned());
        assert_eq!(obj.get::<Score>(), Some(&Score(1)));
        assert!(obj.has::<Owned>());
    }

    #[test]
    fn set_active_counts_changes_only() {
        let (mut m, r) = setup();
        let e = m.create();
        let mut obj = GameObject::new(&mut m, &r, e);
        obj.add(owned());
        assert!(!obj.set_active(true));
        assert!(obj.set_active(false));
        assert!(obj.set_active(true));
        assert_eq!(obj.get::<Owned>().map(|o| o.active_events), Some(2));
    }

    #[test]
    fn destroy_invalidates_lookups() {
        let (mut m, r) = setup();
        let e = m.create();
        let mut obj = GameObject::new(&mut m, &r, e);
        obj.add(Score(5));
        assert!(obj.destroy());
        assert!(!obj.is_alive());
        assert!(obj.get::<Score>().is_none());
        assert!(obj.add(Score(6)).is_none());
        assert!(!obj.destroy());
    }

    #[test]
    fn enable_disable_through_facade() {
        let (mut m, r) = setup();
        let e = m.create();
        let mut obj = GameObject::new(&mut m, &r, e);
        obj.add(Score(0));
        assert!(obj.disable::<Score>());
        assert_eq!(obj.is_enabled::<Score>(), Some(false));
        assert!(obj.enable::<Score>());
        assert!(!obj.disable::<Owned>());
    }
}
