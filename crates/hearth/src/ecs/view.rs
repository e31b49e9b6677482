//! # View: Filtered Iteration Over Component Signatures
//!
//! A view answers "every entity that has all of these components and passes
//! this filter". Two shapes exist:
//!
//! - [`View`] (from [`EntityManager::find`]) is a lazy, read-only, restartable
//!   sequence of `(EntityHandle, (&A, &B, ...))`. Call [`View::iter`] as often as
//!   you like; each call starts over.
//! - [`EntityManager::each_mut`] is the mutable form. It takes a closure, since
//!   `Iterator` can't lend out `&mut` items that borrow the iterator itself.
//!
//! ```text
//! manager.find::<(&Position, &Velocity)>()
//!
//! 1. Driver = dense id list of the FIRST listed type (Position)
//! 2. For each id in the driver:
//!    - entity active state in filter?        (ACTIVE / INACTIVE)
//!    - has every other listed component?
//!    - every component's enabled flag in filter? (COMPONENT_ENABLED / _DISABLED)
//! 3. Yield (handle, (&Position, &Velocity))
//! ```
//!
//! Order is the driver's dense order, not creation order, and it changes when
//! components are removed. Don't rely on it across frames.
//!
//! Views borrow the manager, so structural changes while iterating are
//! compile errors. Queue a [`Command`](crate::command) instead.

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::component::Component;
use super::entity::{EntityHandle, EntityId};
use super::filter::GameObjectFilter;
use super::manager::EntityManager;
use super::sparse_set::{ComponentStorage, downcast_mut, downcast_ref};

// ── Read-only queries ────────────────────────────────────────────────────

/// A read-only component signature: `&T` or a tuple of them.
pub trait Query {
    /// Item yielded per matching entity.
    type Item<'w>;

    fn type_ids() -> Vec<TypeId>;

    /// Dense id order of the first listed type, `None` if that type has no
    /// storage yet.
    fn driver(manager: &EntityManager) -> Option<&[EntityId]>;

    /// Does every listed component's enabled flag pass the filter?
    /// `false` if any component is missing.
    fn state_matches(manager: &EntityManager, id: EntityId, filter: GameObjectFilter) -> bool;

    fn fetch(manager: &EntityManager, id: EntityId) -> Option<Self::Item<'_>>;
}

impl<T: Component> Query for &T {
    type Item<'w> = &'w T;

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn driver(manager: &EntityManager) -> Option<&[EntityId]> {
        manager.storage::<T>().map(|s| s.ids())
    }

    fn state_matches(manager: &EntityManager, id: EntityId, filter: GameObjectFilter) -> bool {
        manager
            .storage::<T>()
            .and_then(|s| s.is_enabled(id))
            .is_some_and(|enabled| filter.matches_component(enabled))
    }

    fn fetch(manager: &EntityManager, id: EntityId) -> Option<Self::Item<'_>> {
        manager.storage::<T>()?.get(id)
    }
}

macro_rules! impl_query_tuple {
    ($First:ident $(, $P:ident)*) => {
        impl<$First: Query $(, $P: Query)*> Query for ($First, $($P,)*) {
            type Item<'w> = ($First::Item<'w>, $($P::Item<'w>,)*);

            fn type_ids() -> Vec<TypeId> {
                let mut ids = $First::type_ids();
                $(ids.extend($P::type_ids());)*
                ids
            }

            fn driver(manager: &EntityManager) -> Option<&[EntityId]> {
                $First::driver(manager)
            }

            fn state_matches(
                manager: &EntityManager,
                id: EntityId,
                filter: GameObjectFilter,
            ) -> bool {
                $First::state_matches(manager, id, filter)
                    $(&& $P::state_matches(manager, id, filter))*
            }

            fn fetch(manager: &EntityManager, id: EntityId) -> Option<Self::Item<'_>> {
                Some(($First::fetch(manager, id)?, $($P::fetch(manager, id)?,)*))
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);
impl_query_tuple!(A, B, C, D, E);
impl_query_tuple!(A, B, C, D, E, F);
impl_query_tuple!(A, B, C, D, E, F, G);
impl_query_tuple!(A, B, C, D, E, F, G, H);

/// Lazy, restartable, read-only view. See the [module docs](self).
pub struct View<'w, Q: Query> {
    manager: &'w EntityManager,
    filter: GameObjectFilter,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: Query> Clone for View<'_, Q> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: Query> Copy for View<'_, Q> {}

impl<'w, Q: Query> View<'w, Q> {
    pub(crate) fn new(manager: &'w EntityManager, filter: GameObjectFilter) -> Self {
        Self {
            manager,
            filter,
            _marker: PhantomData,
        }
    }

    pub fn filter(&self) -> GameObjectFilter {
        self.filter
    }

    /// Replace the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: GameObjectFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Only yield entities whose listed components are all enabled.
    #[must_use]
    pub fn where_enabled(mut self) -> Self {
        self.filter = self
            .filter
            .with_component_state(GameObjectFilter::COMPONENT_ENABLED);
        self
    }

    /// Start a fresh pass.
    pub fn iter(&self) -> ViewIter<'w, Q> {
        ViewIter {
            manager: self.manager,
            filter: self.filter,
            driver: Q::driver(self.manager).unwrap_or(&[]),
            pos: 0,
            _marker: PhantomData,
        }
    }

    /// Closure form of [`iter`](Self::iter).
    pub fn each(&self, mut f: impl FnMut(EntityHandle, Q::Item<'w>)) {
        for (handle, item) in self.iter() {
            f(handle, item);
        }
    }

    /// Number of matching entities. Walks the whole view.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Matching handles only.
    pub fn handles(&self) -> Vec<EntityHandle> {
        self.iter().map(|(handle, _)| handle).collect()
    }
}

impl<'w, Q: Query> IntoIterator for View<'w, Q> {
    type Item = (EntityHandle, Q::Item<'w>);
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'w, Q: Query> IntoIterator for &View<'w, Q> {
    type Item = (EntityHandle, Q::Item<'w>);
    type IntoIter = ViewIter<'w, Q>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`View`].
pub struct ViewIter<'w, Q: Query> {
    manager: &'w EntityManager,
    filter: GameObjectFilter,
    driver: &'w [EntityId],
    pos: usize,
    _marker: PhantomData<fn() -> Q>,
}

impl<'w, Q: Query> Iterator for ViewIter<'w, Q> {
    type Item = (EntityHandle, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&id) = self.driver.get(self.pos) {
            self.pos += 1;
            let Some(handle) = self.manager.current(id) else {
                continue;
            };
            if !self.filter.matches_active(self.manager.is_active_id(id))
                || !Q::state_matches(self.manager, id, self.filter)
            {
                continue;
            }
            if let Some(item) = Q::fetch(self.manager, id) {
                return Some((handle, item));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.driver.len() - self.pos))
    }
}

// ── Mutable queries ──────────────────────────────────────────────────────

type Storages = HashMap<TypeId, Box<dyn ComponentStorage>>;

/// A component signature for [`EntityManager::each_mut`]: `&T`, `&mut T`, or a
/// tuple of them.
///
/// The storages a query needs are moved out of the manager for the pass and
/// put back afterwards, so the borrow checker sees disjoint owned columns.
pub trait QueryMut {
    type Item<'c>;
    /// Storages moved out of the manager for the pass.
    type Column;

    fn type_ids() -> Vec<TypeId>;

    /// Move the needed storages out. Callers check presence first.
    fn extract(storages: &mut Storages) -> Self::Column;

    fn restore(col: Self::Column, storages: &mut Storages);

    /// Snapshot of the first listed type's dense id order.
    fn driver_ids(col: &Self::Column) -> Vec<EntityId>;

    fn state_matches(col: &Self::Column, id: EntityId, filter: GameObjectFilter) -> bool;

    fn fetch(col: &mut Self::Column, id: EntityId) -> Option<Self::Item<'_>>;
}

fn take_storage<T: Component>(storages: &mut Storages) -> (TypeId, Box<dyn ComponentStorage>) {
    let tid = TypeId::of::<T>();
    let storage = storages.remove(&tid).unwrap_or_else(|| {
        panic!(
            "each_mut: storage for `{}` not found",
            std::any::type_name::<T>()
        )
    });
    (tid, storage)
}

fn column_state_matches(
    col: &(TypeId, Box<dyn ComponentStorage>),
    id: EntityId,
    filter: GameObjectFilter,
) -> bool {
    col.1
        .is_enabled(id)
        .is_some_and(|enabled| filter.matches_component(enabled))
}

impl<T: Component> QueryMut for &T {
    type Item<'c> = &'c T;
    type Column = (TypeId, Box<dyn ComponentStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(storages: &mut Storages) -> Self::Column {
        take_storage::<T>(storages)
    }

    fn restore(col: Self::Column, storages: &mut Storages) {
        storages.insert(col.0, col.1);
    }

    fn driver_ids(col: &Self::Column) -> Vec<EntityId> {
        col.1.ids().to_vec()
    }

    fn state_matches(col: &Self::Column, id: EntityId, filter: GameObjectFilter) -> bool {
        column_state_matches(col, id, filter)
    }

    fn fetch(col: &mut Self::Column, id: EntityId) -> Option<Self::Item<'_>> {
        downcast_ref::<T>(col.1.as_ref()).get(id)
    }
}

impl<T: Component> QueryMut for &mut T {
    type Item<'c> = &'c mut T;
    type Column = (TypeId, Box<dyn ComponentStorage>);

    fn type_ids() -> Vec<TypeId> {
        vec![TypeId::of::<T>()]
    }

    fn extract(storages: &mut Storages) -> Self::Column {
        take_storage::<T>(storages)
    }

    fn restore(col: Self::Column, storages: &mut Storages) {
        storages.insert(col.0, col.1);
    }

    fn driver_ids(col: &Self::Column) -> Vec<EntityId> {
        col.1.ids().to_vec()
    }

    fn state_matches(col: &Self::Column, id: EntityId, filter: GameObjectFilter) -> bool {
        column_state_matches(col, id, filter)
    }

    fn fetch(col: &mut Self::Column, id: EntityId) -> Option<Self::Item<'_>> {
        downcast_mut::<T>(col.1.as_mut()).get_mut(id)
    }
}

macro_rules! impl_query_mut_tuple {
    ($First:ident $(, $P:ident)*) => {
        impl<$First: QueryMut $(, $P: QueryMut)*> QueryMut for ($First, $($P,)*) {
            type Item<'c> = ($First::Item<'c>, $($P::Item<'c>,)*);
            type Column = ($First::Column, $($P::Column,)*);

            fn type_ids() -> Vec<TypeId> {
                let mut ids = $First::type_ids();
                $(ids.extend($P::type_ids());)*
                ids
            }

            fn extract(storages: &mut Storages) -> Self::Column {
                ($First::extract(storages), $($P::extract(storages),)*)
            }

            #[allow(non_snake_case)]
            fn restore(col: Self::Column, storages: &mut Storages) {
                let ($First, $($P,)*) = col;
                $First::restore($First, storages);
                $($P::restore($P, storages);)*
            }

            fn driver_ids(col: &Self::Column) -> Vec<EntityId> {
                $First::driver_ids(&col.0)
            }

            #[allow(non_snake_case)]
            fn state_matches(col: &Self::Column, id: EntityId, filter: GameObjectFilter) -> bool {
                let ($First, $($P,)*) = col;
                $First::state_matches($First, id, filter)
                    $(&& $P::state_matches($P, id, filter))*
            }

            #[allow(non_snake_case)]
            fn fetch(col: &mut Self::Column, id: EntityId) -> Option<Self::Item<'_>> {
                let ($First, $($P,)*) = col;
                Some(($First::fetch($First, id)?, $($P::fetch($P, id)?,)*))
            }
        }
    };
}

impl_query_mut_tuple!(A);
impl_query_mut_tuple!(A, B);
impl_query_mut_tuple!(A, B, C);
impl_query_mut_tuple!(A, B, C, D);
impl_query_mut_tuple!(A, B, C, D, E);
impl_query_mut_tuple!(A, B, C, D, E, F);
impl_query_mut_tuple!(A, B, C, D, E, F, G);
impl_query_mut_tuple!(A, B, C, D, E, F, G, H);

/// Columns moved out of the manager for one [`EntityManager::each_mut`] pass.
///
/// Dropping the guard puts them back, including while unwinding out of a
/// panicking closure.
pub(crate) struct ColumnGuard<'s, Q: QueryMut> {
    cols: Option<Q::Column>,
    storages: &'s mut Storages,
}

impl<'s, Q: QueryMut> ColumnGuard<'s, Q> {
    /// Move `Q`'s storages out. Callers check presence first.
    pub(crate) fn extract(storages: &'s mut Storages) -> Self {
        let cols = Q::extract(storages);
        Self {
            cols: Some(cols),
            storages,
        }
    }

    pub(crate) fn columns(&mut self) -> Option<&mut Q::Column> {
        self.cols.as_mut()
    }
}

impl<Q: QueryMut> Drop for ColumnGuard<'_, Q> {
    fn drop(&mut self) {
        if let Some(cols) = self.cols.take() {
            Q::restore(cols, self.storages);
        }
    }
}
