//! Lifecycle and level-crossing events (§4.5, §4.7).
//!
//! A closed sum type over the events the detector and level tracker emit.
//! Like `trendlab-core`'s `components::signal::SignalEvent`, these are
//! value-only records — no owned leg references cross the event boundary
//! (§4.5: "Event objects carry only values").

use serde::{Deserialize, Serialize};

use super::ids::LegId;
use super::leg::{LegDirection, PruneReason};

/// A lifecycle event emitted by the leg detector during one `advance` call.
///
/// `explanation` is a human-readable rendering of the same event (§12 of
/// `SPEC_FULL.md`), grounded in the original Python detector's
/// `_format_trigger_explanation` — cheap to produce and useful to any
/// logging or UI sink without forcing that sink to re-derive the numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    LegCreated {
        leg_id: LegId,
        direction: LegDirection,
        origin_price: f64,
        origin_index: u64,
        pivot_price: f64,
        pivot_index: u64,
        bar_index: u64,
        explanation: String,
    },
    OriginBreached {
        leg_id: LegId,
        breach_price: f64,
        bar_index: u64,
        explanation: String,
    },
    PivotBreached {
        leg_id: LegId,
        breach_price: f64,
        breach_amount: f64,
        bar_index: u64,
        explanation: String,
    },
    LegPruned {
        leg_id: LegId,
        reason: PruneReason,
        explanation: String,
        bar_index: u64,
    },
}

impl LifecycleEvent {
    pub fn leg_id(&self) -> &LegId {
        match self {
            Self::LegCreated { leg_id, .. }
            | Self::OriginBreached { leg_id, .. }
            | Self::PivotBreached { leg_id, .. }
            | Self::LegPruned { leg_id, .. } => leg_id,
        }
    }

    pub fn bar_index(&self) -> u64 {
        match self {
            Self::LegCreated { bar_index, .. }
            | Self::OriginBreached { bar_index, .. }
            | Self::PivotBreached { bar_index, .. }
            | Self::LegPruned { bar_index, .. } => *bar_index,
        }
    }
}

/// Direction of a fib-level crossing between two consecutive bars (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    Up,
    Down,
}

/// A Fibonacci level crossing detected for a tracked leg (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCrossEvent {
    pub leg_id: LegId,
    pub direction: LegDirection,
    pub level_crossed: f64,
    pub cross_direction: CrossDirection,
    pub bar_index: u64,
    pub timestamp: i64,
    pub explanation: String,
}

/// The closed sum type over every event the core emits during `advance`
/// (§9 "Polymorphism over event kinds"). Outer layers dispatch on this tag
/// rather than on separate lifecycle/crossing event streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Lifecycle(LifecycleEvent),
    LevelCross(LevelCrossEvent),
}

impl From<LifecycleEvent> for Event {
    fn from(event: LifecycleEvent) -> Self {
        Self::Lifecycle(event)
    }
}

impl From<LevelCrossEvent> for Event {
    fn from(event: LevelCrossEvent) -> Self {
        Self::LevelCross(event)
    }
}
