//! # Component: Data Plus Optional Lifecycle Hooks
//!
//! Components are plain structs. Implementing [`Component`] is all that's
//! required to store one; every hook has an empty default body, so most
//! components are a one-line `impl Component for Health {}`.
//!
//! Hooks are invoked by the runtime, never by the component itself:
//!
//! | Hook | Called when |
//! |---|---|
//! | `on_attach(owner)` | the component is added through a [`GameObject`](crate::object::GameObject) |
//! | `on_acquire` / `on_release` | the owner is drawn from / returned to an [`ObjectPool`](crate::pool::ObjectPool) |
//! | `on_activate` / `on_deactivate` | the owner's active flag flips |
//!
//! `on_acquire`/`on_release` must leave the component in a pool-safe state and
//! be idempotent. Hooks can't fail; a hook with nothing sensible to do on bad
//! input should log and return.
//!
//! The per-component *enabled* flag is not part of this trait. It lives next
//! to the value in the [`SparseSet`](super::sparse_set::SparseSet) and is purely
//! advisory, used by view filters.
//!
//! Acquire/release/activate/deactivate are routed through the
//! [`ComponentReflector`](super::reflect::ComponentReflector), so only
//! registered types receive them.

use super::entity::EntityHandle;

/// A per-entity, per-type unit of data.
#[allow(unused_variables)]
pub trait Component: 'static {
    /// Added to `owner` through a game object.
    fn on_attach(&mut self, owner: EntityHandle) {}

    /// Owner drawn from an object pool.
    fn on_acquire(&mut self) {}

    /// Owner returned to an object pool.
    fn on_release(&mut self) {}

    /// Owner became active.
    fn on_activate(&mut self) {}

    /// Owner became inactive.
    fn on_deactivate(&mut self) {}
}
