//! Per-frame diagnostics.
//!
//! Enabled by the `diagnostics` feature flag (on by default). The world keeps
//! spawn/despawn counters, command flush totals and per-system timings, and
//! hands them out as a [`FrameStats`] snapshot once per frame through
//! [`GameWorld::take_frame_stats`](crate::world::GameWorld::take_frame_stats).
//! Snapshots serialize to JSON for whatever tool wants to display them.

use serde::Serialize;

/// Entity slot usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityPoolStats {
    pub total_slots: usize,
    pub free_count: usize,
    pub alive_count: usize,
    /// Number of component types with a storage.
    pub component_types: usize,
    pub spawned_this_frame: u32,
    pub despawned_this_frame: u32,
}

impl EntityPoolStats {
    /// Percentage of slots sitting on the free list.
    pub fn fragmentation_pct(&self) -> f32 {
        if self.total_slots == 0 {
            0.0
        } else {
            self.free_count as f32 / self.total_slots as f32 * 100.0
        }
    }
}

/// Wall time of one system during the last schedule run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemTiming {
    pub phase: &'static str,
    pub name: String,
    pub duration_us: f64,
}

/// Everything recorded since the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameStats {
    pub frame: u64,
    pub entities: EntityPoolStats,
    pub commands_executed: usize,
    pub commands_skipped: usize,
    pub systems: Vec<SystemTiming>,
}

impl FrameStats {
    pub fn systems_us(&self) -> f64 {
        self.systems.iter().map(|t| t.duration_us).sum()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
