//! # Commands: Deferred Structural Mutation
//!
//! Systems iterate views that borrow the [`EntityManager`](crate::ecs::EntityManager),
//! so they can't spawn, despawn, or add components mid-pass. They queue a
//! command instead, and the world applies the queue at a flush point.
//!
//! ```text
//! system pass                        flush point
//! ───────────                        ───────────
//! buffer.add(e, Despawn)     ──┐
//! buffer.add_world(SpawnFrom)  ├──▶  for cmd in queue (FIFO):
//! buffer.send(e, Damage{..})  ─┘       target alive?  ── no ──▶ skipped (logged)
//!                                          │ yes
//!                                          ▼
//!                                      execute / dispatch
//!                                    queue cleared
//! ```
//!
//! Three shapes are queued:
//!
//! - [`TargetedCommand`]: runs against one entity through a [`GameObject`].
//! - [`WorldCommand`]: runs against the whole [`GameWorld`].
//! - *dispatched*: a plain value routed to the handler registered for its type
//!   (see [`dispatch`](crate::dispatch)).
//!
//! Any `FnOnce(&mut GameObject)` is a `TargetedCommand` and any
//! `FnOnce(&mut GameWorld)` is a `WorldCommand`, so one-off commands can be closures.
//!
//! A command runs at most once. Nothing is retried, and a command whose target
//! died before the flush is dropped.

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use crate::ecs::{Component, EntityHandle};
use crate::object::GameObject;
use crate::world::GameWorld;

/// A deferred mutation of one entity.
pub trait TargetedCommand: 'static {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>);
}

impl<F: FnOnce(&mut GameObject<'_>) + 'static> TargetedCommand for F {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        (*self)(object)
    }
}

/// A deferred mutation of the world.
pub trait WorldCommand: 'static {
    fn execute(self: Box<Self>, world: &mut GameWorld);
}

impl<F: FnOnce(&mut GameWorld) + 'static> WorldCommand for F {
    fn execute(self: Box<Self>, world: &mut GameWorld) {
        (*self)(world)
    }
}

enum Queued {
    Targeted {
        target: EntityHandle,
        command: Box<dyn TargetedCommand>,
        name: &'static str,
    },
    World {
        command: Box<dyn WorldCommand>,
        name: &'static str,
    },
    Dispatched {
        target: EntityHandle,
        type_id: TypeId,
        payload: Box<dyn Any>,
        name: &'static str,
    },
}

/// Outcome counts of one [`CommandBuffer::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub executed: usize,
    /// Stale targets, plus dispatched commands with no handler.
    pub skipped: usize,
}

impl FlushStats {
    pub fn total(&self) -> usize {
        self.executed + self.skipped
    }
}

impl std::ops::AddAssign for FlushStats {
    fn add_assign(&mut self, rhs: Self) {
        self.executed += rhs.executed;
        self.skipped += rhs.skipped;
    }
}

/// FIFO queue of pending commands.
#[derive(Default)]
pub struct CommandBuffer {
    queue: Vec<Queued>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `command` against `target`.
    pub fn add<C: TargetedCommand>(&mut self, target: EntityHandle, command: C) {
        self.queue.push(Queued::Targeted {
            target,
            command: Box::new(command),
            name: std::any::type_name::<C>(),
        });
    }

    /// Closure form of [`add`](Self::add).
    pub fn add_fn(&mut self, target: EntityHandle, f: impl FnOnce(&mut GameObject<'_>) + 'static) {
        self.add(target, f);
    }

    pub fn add_world<C: WorldCommand>(&mut self, command: C) {
        self.queue.push(Queued::World {
            command: Box::new(command),
            name: std::any::type_name::<C>(),
        });
    }

    /// Closure form of [`add_world`](Self::add_world).
    pub fn add_world_fn(&mut self, f: impl FnOnce(&mut GameWorld) + 'static) {
        self.add_world(f);
    }

    /// Queue a plain value for the dispatcher registered for `C`.
    pub fn send<C: 'static>(&mut self, target: EntityHandle, command: C) {
        self.queue.push(Queued::Dispatched {
            target,
            type_id: TypeId::of::<C>(),
            payload: Box::new(command),
            name: std::any::type_name::<C>(),
        });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending command without running it.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Move `other`'s commands to the back of this queue.
    pub fn append(&mut self, other: &mut CommandBuffer) {
        self.queue.append(&mut other.queue);
    }

    /// Apply every queued command to `world` in FIFO order, then leave the
    /// buffer empty.
    ///
    /// Commands whose target is no longer alive are skipped. Commands queued
    /// on the world while this runs are left for the next flush.
    pub fn flush(&mut self, world: &mut GameWorld) -> FlushStats {
        let mut stats = FlushStats::default();
        let warn_stale = world.config().warn_on_stale_commands;

        for queued in self.queue.drain(..) {
            match queued {
                Queued::Targeted {
                    target,
                    command,
                    name,
                } => match world.object(target) {
                    Some(mut object) => {
                        command.execute(&mut object);
                        stats.executed += 1;
                    }
                    None => {
                        report_stale(warn_stale, name, target);
                        stats.skipped += 1;
                    }
                },
                Queued::World { command, name } => {
                    log::trace!("flush: world command {}", name);
                    command.execute(world);
                    stats.executed += 1;
                }
                Queued::Dispatched {
                    target,
                    type_id,
                    payload,
                    name,
                } => {
                    if !world.is_alive(target) {
                        report_stale(warn_stale, name, target);
                        stats.skipped += 1;
                    } else if world.dispatch_command(target, type_id, &*payload) {
                        stats.executed += 1;
                    } else {
                        log::warn!("flush: no handler registered for {}, dropped", name);
                        stats.skipped += 1;
                    }
                }
            }
        }

        if stats.total() > 0 {
            log::trace!(
                "flush: {} executed, {} skipped",
                stats.executed,
                stats.skipped
            );
        }
        stats
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("len", &self.queue.len())
            .finish()
    }
}

fn report_stale(warn: bool, name: &str, target: EntityHandle) {
    if warn {
        log::warn!("flush: {} skipped, target {} is stale", name, target);
    } else {
        log::debug!("flush: {} skipped, target {} is stale", name, target);
    }
}

// ── Built-in commands ────────────────────────────────────────────────────

/// Destroy the target (deactivate hooks run first).
#[derive(Debug, Clone, Copy, Default)]
pub struct Despawn;

impl TargetedCommand for Despawn {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        object.destroy();
    }
}

/// Attach a component. A duplicate is dropped with a debug log.
#[derive(Debug, Clone)]
pub struct Insert<T>(pub T);

impl<T: Component> TargetedCommand for Insert<T> {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        if object.add(self.0).is_none() {
            log::debug!(
                "Insert: {:?} already has a {}",
                object.handle(),
                std::any::type_name::<T>()
            );
        }
    }
}

/// Remove a component, subject to the removal guard.
pub struct RemoveComponent<T>(PhantomData<fn() -> T>);

impl<T> RemoveComponent<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for RemoveComponent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> TargetedCommand for RemoveComponent<T> {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        if !object.remove::<T>() {
            log::debug!(
                "RemoveComponent: {} on {:?} absent or vetoed",
                std::any::type_name::<T>(),
                object.handle()
            );
        }
    }
}

/// Activate or deactivate the target, running hooks on a change.
#[derive(Debug, Clone, Copy)]
pub struct SetActive(pub bool);

impl TargetedCommand for SetActive {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        object.set_active(self.0);
    }
}

/// Flip the enabled flag of the target's `T`.
pub struct SetEnabled<T> {
    enabled: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SetEnabled<T> {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            _marker: PhantomData,
        }
    }
}

impl<T: Component> TargetedCommand for SetEnabled<T> {
    fn execute(self: Box<Self>, object: &mut GameObject<'_>) {
        let handle = object.handle();
        if !object.entities().set_enabled::<T>(handle, self.enabled) {
            log::debug!(
                "SetEnabled: {:?} has no {}",
                handle,
                std::any::type_name::<T>()
            );
        }
    }
}

/// Instantiate a prefab.
///
/// Unlike [`GameWorld::instantiate`], a prefab that died before the flush is
/// logged and skipped rather than treated as a programmer error.
#[derive(Debug, Clone, Copy)]
pub struct SpawnFrom {
    pub prefab: EntityHandle,
    pub active: bool,
}

impl SpawnFrom {
    pub fn new(prefab: EntityHandle) -> Self {
        Self {
            prefab,
            active: true,
        }
    }

    pub fn inactive(prefab: EntityHandle) -> Self {
        Self {
            prefab,
            active: false,
        }
    }
}

impl WorldCommand for SpawnFrom {
    fn execute(self: Box<Self>, world: &mut GameWorld) {
        if !world.is_alive(self.prefab) {
            log::warn!("SpawnFrom: prefab {} is gone, nothing spawned", self.prefab);
            return;
        }
        if self.active {
            world.instantiate(self.prefab);
        } else {
            world.instantiate_inactive(self.prefab);
        }
    }
}
