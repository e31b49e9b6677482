//! # Schedule: Phased System Execution
//!
//! A system is a function that takes `&mut GameWorld`. Systems are grouped
//! into three [`Phase`]s and run in registration order within each phase:
//!
//! ```text
//! run(world)
//!   startup systems (first run only)   -> flush
//!   PreUpdate  [s1, s2, ...]           -> flush
//!   Update     [s3, s4, ...]           -> flush
//!   PostUpdate [s5, ...]               -> flush
//! ```
//!
//! The command buffer is flushed after every phase, so a `PostUpdate` reader
//! sees every spawn and despawn queued during `Update`. Within a phase,
//! systems see storage exactly as the phase began plus their own direct
//! writes; queued commands wait for the phase boundary.
//!
//! ## Comparison
//!
//! - **bevy_ecs**: schedules are graphs with run conditions, ordering
//!   constraints and parallel executors.
//! - **hecs**: no scheduling at all.
//!
//! This sits between the two: fixed phases, sequential systems, no
//! parallelism. Ordering is just the order you call `add_system`.

use std::fmt;

use crate::command::FlushStats;
use crate::world::GameWorld;

/// A system that can be executed on a [`GameWorld`].
///
/// Any `FnMut(&mut GameWorld)` implements this trait.
pub trait System {
    fn run(&mut self, world: &mut GameWorld);
}

impl<F: FnMut(&mut GameWorld)> System for F {
    fn run(&mut self, world: &mut GameWorld) {
        (self)(world);
    }
}

/// Frame phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    PreUpdate,
    Update,
    PostUpdate,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::PreUpdate, Phase::Update, Phase::PostUpdate];

    pub fn name(self) -> &'static str {
        match self {
            Phase::PreUpdate => "PreUpdate",
            Phase::Update => "Update",
            Phase::PostUpdate => "PostUpdate",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct NamedSystem {
    name: String,
    system: Box<dyn System>,
}

/// Systems per phase, plus one-shot startup systems.
pub struct Schedule {
    startup: Vec<NamedSystem>,
    phases: [Vec<NamedSystem>; 3],
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            startup: Vec::new(),
            phases: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Append a system to `phase`.
    pub fn add_system<S: System + 'static>(&mut self, phase: Phase, system: S) -> &mut Self {
        self.phases[phase.index()].push(NamedSystem {
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
        self
    }

    /// Run `system` once, before the phases of the next [`run`](Self::run).
    pub fn add_startup_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.startup.push(NamedSystem {
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
        self
    }

    /// Run one frame. Returns the combined stats of every flush.
    pub fn run(&mut self, world: &mut GameWorld) -> FlushStats {
        let mut stats = FlushStats::default();

        if !self.startup.is_empty() {
            for mut ns in std::mem::take(&mut self.startup) {
                log::debug!("startup system: {}", ns.name);
                ns.system.run(world);
            }
            stats += world.flush_commands();
        }

        for phase in Phase::ALL {
            for ns in &mut self.phases[phase.index()] {
                #[cfg(feature = "diagnostics")]
                let start = std::time::Instant::now();

                ns.system.run(world);

                #[cfg(feature = "diagnostics")]
                world.record_system_timing(crate::diag::SystemTiming {
                    phase: phase.name(),
                    name: ns.name.clone(),
                    duration_us: start.elapsed().as_secs_f64() * 1_000_000.0,
                });
            }
            stats += world.flush_commands();
        }
        stats
    }

    /// Number of systems in `phase`.
    pub fn len(&self, phase: Phase) -> usize {
        self.phases[phase.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.startup.is_empty() && self.phases.iter().all(Vec::is_empty)
    }

    /// System names of `phase`, in run order.
    pub fn system_names(&self, phase: Phase) -> Vec<&str> {
        self.phases[phase.index()]
            .iter()
            .map(|ns| ns.name.as_str())
            .collect()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the module path from a type name (`game::movement` → `movement`,
/// `{{closure}}` → `<closure>`).
fn short_system_name(full: &str) -> String {
    let name = full.rsplit("::").next().unwrap_or(full);
    if name.contains("closure") {
        "<closure>".to_string()
    } else {
        name.to_string()
    }
}
