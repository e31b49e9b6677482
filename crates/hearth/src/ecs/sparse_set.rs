//! # SparseSet: Per-Type Component Storage
//!
//! Every component type gets its own [`SparseSet<T>`]: a *sparse* array mapping
//! an [`EntityId`] to a position in a *dense*, tightly packed array of values.
//!
//! ## Memory Layout
//!
//! ```text
//! sparse:  [None, Some(1), None, Some(0), Some(2)]   <- indexed by EntityId
//! dense:   [hp3,  hp1,  hp4 ]                        <- values, packed
//! ids:     [3,    1,    4   ]                        <- owner of dense[i]
//! enabled: [true, false, true]                       <- per-component flag
//! ```
//!
//! Lookup is `sparse[id] -> dense index -> value`, O(1). Removal swaps the
//! victim with the last dense element, pops, and patches the moved element's
//! sparse entry.
//!
//! ## Pointer Stability
//!
//! There is none across structural mutation. Growth reallocates `dense`, and
//! removal moves the last element into the hole. References handed out by
//! [`get`](SparseSet::get) borrow the set, so the compiler rejects holding one
//! across an `emplace`/`remove`; code that needs to find a component again later
//! must keep the [`EntityHandle`](super::entity::EntityHandle), not a reference.
//!
//! ## Type-Erased Front
//!
//! The [`EntityManager`](super::manager::EntityManager) keeps one
//! `Box<dyn ComponentStorage>` per type. [`ComponentStorage`] covers what can
//! be done without knowing `T` (presence, eviction, enabled flags); typed access
//! downcasts back to `SparseSet<T>`.

use std::any::Any;

use super::entity::EntityId;

/// Removal guard. Receives the component about to be removed and returns
/// whether removal may proceed.
pub type RemoveGuard<T> = Box<dyn FnMut(&T) -> bool>;

/// Dense/sparse storage for one component type, keyed by entity id.
pub struct SparseSet<T> {
    sparse: Vec<Option<u32>>,
    dense: Vec<T>,
    ids: Vec<EntityId>,
    enabled: Vec<bool>,
    on_remove: Option<RemoveGuard<T>>,
}

impl<T> SparseSet<T> {
    pub fn new() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            ids: Vec::new(),
            enabled: Vec::new(),
            on_remove: None,
        }
    }

    /// Create a set with room for `capacity` components before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sparse: Vec::with_capacity(capacity),
            dense: Vec::with_capacity(capacity),
            ids: Vec::with_capacity(capacity),
            enabled: Vec::with_capacity(capacity),
            on_remove: None,
        }
    }

    fn dense_index(&self, id: EntityId) -> Option<usize> {
        self.sparse
            .get(id as usize)
            .copied()
            .flatten()
            .map(|i| i as usize)
    }

    /// Store `value` for `id`.
    ///
    /// Returns `None` and leaves the existing value untouched if `id` already
    /// has a component of this type. A duplicate is an expected outcome, not an
    /// error; callers check the return value.
    pub fn emplace(&mut self, id: EntityId, value: T) -> Option<&mut T> {
        if self.contains(id) {
            return None;
        }
        let slot = id as usize;
        if slot >= self.sparse.len() {
            self.sparse.resize(slot + 1, None);
        }
        let index = self.dense.len();
        self.sparse[slot] = Some(index as u32);
        self.dense.push(value);
        self.ids.push(id);
        self.enabled.push(true);
        self.dense.last_mut()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.dense_index(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.dense_index(id).map(|i| &self.dense[i])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.dense_index(id).map(|i| &mut self.dense[i])
    }

    /// Remove the component for `id`, subject to the removal guard.
    ///
    /// Returns `false` if `id` has no component or the guard vetoed the
    /// removal. A vetoed component stays exactly where it was.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(index) = self.dense_index(id) else {
            return false;
        };
        if let Some(guard) = self.on_remove.as_mut() {
            if !guard(&self.dense[index]) {
                return false;
            }
        }
        self.swap_remove_at(index);
        true
    }

    /// Remove the component for `id` without consulting the guard, handing
    /// the value back. Used when the owning entity is destroyed.
    pub fn evict(&mut self, id: EntityId) -> Option<T> {
        let index = self.dense_index(id)?;
        Some(self.swap_remove_at(index))
    }

    fn swap_remove_at(&mut self, index: usize) -> T {
        let removed_id = self.ids[index];
        self.sparse[removed_id as usize] = None;
        let value = self.dense.swap_remove(index);
        self.ids.swap_remove(index);
        self.enabled.swap_remove(index);
        // Patch the element that moved into the hole, if any.
        if let Some(&moved) = self.ids.get(index) {
            self.sparse[moved as usize] = Some(index as u32);
        }
        value
    }

    /// Install the removal guard. Without one, every removal is permitted.
    pub fn set_on_remove_callback(&mut self, guard: impl FnMut(&T) -> bool + 'static) {
        self.on_remove = Some(Box::new(guard));
    }

    /// Drop the removal guard, restoring the always-permit default.
    pub fn clear_on_remove_callback(&mut self) {
        self.on_remove = None;
    }

    /// Enabled flag for `id`'s component, or `None` if absent.
    pub fn is_enabled(&self, id: EntityId) -> Option<bool> {
        self.dense_index(id).map(|i| self.enabled[i])
    }

    /// Set the enabled flag. Returns `false` if `id` has no component.
    pub fn set_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        match self.dense_index(id) {
            Some(i) => {
                self.enabled[i] = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Owner ids in dense order. This is the iteration order of views driven
    /// by this type; it changes whenever a component is removed.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Iterate `(id, value)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.ids.iter().copied().zip(self.dense.iter())
    }

    /// Iterate `(id, value)` mutably in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.ids.iter().copied().zip(self.dense.iter_mut())
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Operations on a component store that don't need the concrete type.
pub trait ComponentStorage {
    /// Fully-qualified name of the stored component type.
    fn type_name(&self) -> &'static str;
    fn contains(&self, id: EntityId) -> bool;
    fn len(&self) -> usize;
    /// Guarded removal, see [`SparseSet::remove`].
    fn remove(&mut self, id: EntityId) -> bool;
    /// Unguarded removal; the value is dropped. Returns whether one existed.
    fn evict(&mut self, id: EntityId) -> bool;
    fn is_enabled(&self, id: EntityId) -> Option<bool>;
    fn set_enabled(&mut self, id: EntityId, enabled: bool) -> bool;
    fn ids(&self) -> &[EntityId];
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ComponentStorage for SparseSet<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn contains(&self, id: EntityId) -> bool {
        SparseSet::contains(self, id)
    }

    fn len(&self) -> usize {
        SparseSet::len(self)
    }

    fn remove(&mut self, id: EntityId) -> bool {
        SparseSet::remove(self, id)
    }

    fn evict(&mut self, id: EntityId) -> bool {
        SparseSet::evict(self, id).is_some()
    }

    fn is_enabled(&self, id: EntityId) -> Option<bool> {
        SparseSet::is_enabled(self, id)
    }

    fn set_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        SparseSet::set_enabled(self, id, enabled)
    }

    fn ids(&self) -> &[EntityId] {
        SparseSet::ids(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcast a type-erased store back to its concrete set.
///
/// # Panics
///
/// Panics on a type mismatch, which means the storage map is keyed wrong.
pub(crate) fn downcast_ref<T: 'static>(storage: &dyn ComponentStorage) -> &SparseSet<T> {
    storage
        .as_any()
        .downcast_ref::<SparseSet<T>>()
        .unwrap_or_else(|| {
            panic!(
                "component storage type mismatch: expected `{}`, found `{}`",
                std::any::type_name::<T>(),
                storage.type_name()
            )
        })
}

/// Mutable counterpart of [`downcast_ref`].
pub(crate) fn downcast_mut<T: 'static>(storage: &mut dyn ComponentStorage) -> &mut SparseSet<T> {
    let found = storage.type_name();
    storage
        .as_any_mut()
        .downcast_mut::<SparseSet<T>>()
        .unwrap_or_else(|| {
            panic!(
                "component storage type mismatch: expected `{}`, found `{}`",
                std::any::type_name::<T>(),
                found
            )
        })
}
