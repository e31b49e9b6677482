//! # Hearth: Entity/Component Runtime
//!
//! The storage and mutation core of a single-threaded game engine:
//! generational entity handles, per-type sparse-set storage, lifecycle hooks
//! dispatched through a type registry, filtered views, and a command buffer
//! that defers structural changes to a safe point in the frame.
//!
//! Start with `use hearth::prelude::*`, create a [`GameWorld`](world::GameWorld),
//! register your components once, and drive it with a [`Schedule`](schedule::Schedule).
//!
//! ```ignore
//! let mut world = GameWorld::new();
//! world.register_components(|r| {
//!     r.register_type::<Position>();
//!     r.register_type::<Velocity>();
//! });
//!
//! let mut schedule = Schedule::new();
//! schedule.add_system(Phase::Update, |w: &mut GameWorld| {
//!     w.each_mut::<(&mut Position, &Velocity)>(GameObjectFilter::default(), |_, (p, v)| {
//!         p.0 += v.0;
//!     });
//! });
//! schedule.run(&mut world);
//! ```

pub mod command;
pub mod config;
pub mod dispatch;
pub mod ecs;
pub mod object;
pub mod pool;
pub mod prelude;
pub mod schedule;
pub mod world;

#[cfg(feature = "diagnostics")]
pub mod diag;
