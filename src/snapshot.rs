//! Per-bar snapshot buffer (§4.8).
//!
//! One value-copy snapshot per advanced bar, sized so a consumer can scrub
//! playback without re-querying (§1 "replay-ready state snapshot"). Legs
//! never cross the snapshot boundary by reference (§9 "do not let
//! `ReferenceSwing` outlive the detector"); only owned, cloneable fields are
//! stored here, in the vein of `RunResult` in the teacher's `engine/state.rs`.

use serde::{Deserialize, Serialize};

use crate::domain::{LegId, LevelCrossEvent};
use crate::reference::ReferenceState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefStateSnapshot {
    pub bar_index: u64,
    pub close: f64,
    pub reference_state: ReferenceState,
    pub formed_leg_ids: Vec<LegId>,
    pub level_crossings: Vec<LevelCrossEvent>,
    pub median: f64,
    pub auto_tracked_leg_id: Option<LegId>,
}

/// Append-only, bar-index-ordered buffer of [`RefStateSnapshot`]s (§5
/// "snapshots are appended in bar-index order; callers can assume monotone
/// snapshot indices").
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    snapshots: Vec<RefStateSnapshot>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: RefStateSnapshot) {
        debug_assert!(
            self.snapshots.last().map_or(true, |s| snapshot.bar_index > s.bar_index),
            "snapshots must be appended in strictly increasing bar_index order"
        );
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Snapshot for a given bar index, or `None` if it was never retained
    /// (§6.2 `get_reference_state`).
    pub fn get(&self, bar_index: u64) -> Option<&RefStateSnapshot> {
        self.snapshots
            .binary_search_by_key(&bar_index, |s| s.bar_index)
            .ok()
            .map(|idx| &self.snapshots[idx])
    }

    pub fn last(&self) -> Option<&RefStateSnapshot> {
        self.snapshots.last()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
