//! # Sparse-Set ECS Core
//!
//! Entity identity, per-type component storage, lifecycle dispatch and
//! filtered views. Everything above this layer ([`GameWorld`](crate::world::GameWorld),
//! commands, pools) is built from these pieces.
//!
//! ## Module Overview
//!
//! - [`entity`]: Generational handles and the slot registry
//! - [`sparse_set`]: One `SparseSet<T>` per component type, behind a type-erased trait
//! - [`component`]: The `Component` trait and its lifecycle hooks
//! - [`reflect`]: TypeId -> function table for clone and lifecycle dispatch
//! - [`manager`]: Registry + storages + active flags + names
//! - [`view`]: Read-only views and mutable closure passes
//! - [`filter`]: Active/enabled state mask used by views
//!
//! ## Comparison
//!
//! Archetype ECSs (bevy_ecs, hecs) group entities by component signature and
//! iterate tightly packed tables. Sparse sets (EnTT, shipyard) keep one packed
//! array per type instead: adding or removing a component is O(1) with no
//! table moves, at the cost of a sparse lookup for every non-driver type in a
//! multi-component view. Gameplay code here adds and removes components
//! constantly (pooled projectiles, power-ups), which is the sparse-set sweet spot.

pub mod component;
pub mod entity;
pub mod filter;
pub mod manager;
pub mod reflect;
pub mod sparse_set;
pub mod view;

pub use component::Component;
pub use entity::{EntityHandle, EntityId, EntityRegistry, VersionId};
pub use filter::GameObjectFilter;
pub use manager::EntityManager;
pub use reflect::{ComponentOps, ComponentReflector};
pub use sparse_set::{ComponentStorage, RemoveGuard, SparseSet};
pub use view::{Query, QueryMut, View, ViewIter};
