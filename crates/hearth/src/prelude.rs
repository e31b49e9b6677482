//! Convenience re-exports for gameplay code.
//!
//! ```ignore
//! use hearth::prelude::*;
//! ```

pub use crate::command::{
    CommandBuffer, Despawn, FlushStats, Insert, RemoveComponent, SetActive, SetEnabled, SpawnFrom,
    TargetedCommand, WorldCommand,
};
pub use crate::config::{ConfigError, WorldConfig};
pub use crate::dispatch::{Accept, Dispatch, DispatchTable, TypedDispatcher};
pub use crate::ecs::{
    Component, ComponentReflector, EntityHandle, EntityManager, GameObjectFilter, SparseSet, View,
};
pub use crate::object::GameObject;
pub use crate::pool::ObjectPool;
pub use crate::schedule::{Phase, Schedule, System};
pub use crate::world::GameWorld;

#[cfg(feature = "diagnostics")]
pub use crate::diag::FrameStats;
