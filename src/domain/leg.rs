//! Leg — a directional price move from an origin pivot to an extending pivot.

use serde::{Deserialize, Serialize};

use super::ids::LegId;

/// Direction of a leg: `Bull` rose from a low origin to a high pivot,
/// `Bear` fell from a high origin to a low pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LegDirection {
    Bull = 0,
    Bear = 1,
}

/// Terminal or active lifecycle state of a `Leg` (§3). A leg leaves `Active`
/// at most once; the terminal status is permanent for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Active,
    Pruned,
    Engulfed,
    PivotBreached,
}

impl LegStatus {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Why a leg left `Active` (§4.5 `LegPruned::reason`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PruneReason {
    Engulfed,
    PivotBreach,
    DominatedInTurn,
    OriginRangePrune,
    OriginTimePrune,
    ExtensionPrune,
    InnerStructure,
    TurnPrune,
    ProximityPrune,
}

impl PruneReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Engulfed => "engulfed",
            Self::PivotBreach => "pivot_breach",
            Self::DominatedInTurn => "dominated_in_turn",
            Self::OriginRangePrune => "origin_range_prune",
            Self::OriginTimePrune => "origin_time_prune",
            Self::ExtensionPrune => "extension_prune",
            Self::InnerStructure => "inner_structure",
            Self::TurnPrune => "turn_prune",
            Self::ProximityPrune => "proximity_prune",
        }
    }
}

/// A directional price leg tracked by the detector (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leg {
    pub leg_id: LegId,
    pub direction: LegDirection,
    pub origin_price: f64,
    pub origin_index: u64,
    pub pivot_price: f64,
    pub pivot_index: u64,
    pub range: f64,
    pub status: LegStatus,
    pub bar_count: u64,
    pub depth: u32,
    pub parent_leg_id: Option<LegId>,
    /// Fraction of the leg's formation that happened in directional, as
    /// opposed to choppy, bars (§4.6 `impulse_score`). The detector does not
    /// currently compute this (§9 open question); it stays `None` for every
    /// leg, which means `SalienceWeights::default`'s non-zero `impulse`
    /// weight is always redistributed across the other terms rather than
    /// ever applied (see `salience::redistribute_impulse_weight`).
    pub impulsiveness: Option<f64>,
    pub max_origin_breach: Option<f64>,
    /// Furthest intrabar excursion past `pivot_price` in the trend-continuation
    /// direction ever observed, before a confirmed swing catches the pivot up
    /// to it (§4.4 step 5). Distinct from reference-frame pivot breach, which
    /// operates on formed legs' close-based `location`.
    pub max_pivot_breach: Option<f64>,
    /// Consecutive bars this leg has sat at or beyond 2x its range past the
    /// pivot without a confirmed swing extending it further (§4.4 step 6
    /// "stale extension").
    pub stale_bars: u64,
    /// Bar index at which the leg first satisfied the reference-formation
    /// threshold; `None` before. Set once by `ReferenceLayer::update` and
    /// never cleared afterward, including across a later fatal breach —
    /// this is a historical marker, distinct from the reference layer's own
    /// FormedRefs membership, which a fatal breach does retract.
    pub formation_bar: Option<u64>,
    /// Largest counter-trend excursion observed before the pivot was set,
    /// expressed as a price range. Feeds the salience `counter_score`
    /// (§4.6) and the `range_counter_score` cross-term; `None` until the
    /// detector has observed at least one counter move. Like
    /// `impulsiveness`, the detector never populates this today.
    pub counter_range: Option<f64>,
}

impl Leg {
    pub fn new(
        leg_id: LegId,
        direction: LegDirection,
        origin_price: f64,
        origin_index: u64,
        pivot_price: f64,
        pivot_index: u64,
        depth: u32,
        parent_leg_id: Option<LegId>,
    ) -> Self {
        let range = (origin_price - pivot_price).abs();
        Self {
            leg_id,
            direction,
            origin_price,
            origin_index,
            pivot_price,
            pivot_index,
            range,
            status: LegStatus::Active,
            bar_count: 0,
            depth,
            parent_leg_id,
            impulsiveness: None,
            max_origin_breach: None,
            max_pivot_breach: None,
            stale_bars: 0,
            formation_bar: None,
            counter_range: None,
        }
    }

    /// Attempt to extend the pivot. Bull legs only extend upward, bear legs
    /// only downward (§3); a non-extending update is ignored and returns
    /// `false`.
    pub fn try_extend_pivot(&mut self, price: f64, index: u64) -> bool {
        let extends = match self.direction {
            LegDirection::Bull => price > self.pivot_price,
            LegDirection::Bear => price < self.pivot_price,
        };
        if !extends {
            return false;
        }
        self.pivot_price = price;
        self.pivot_index = index;
        self.range = (self.origin_price - self.pivot_price).abs();
        true
    }

    pub fn is_formed(&self) -> bool {
        self.formation_bar.is_some()
    }

    /// Whether `origin_index`..`pivot_index` of `self` brackets `other`'s
    /// origin and pivot indices — used to assign `parent_leg_id` (§4.4 step 4).
    pub fn contains(&self, other_origin_index: u64, other_pivot_index: u64) -> bool {
        self.origin_index <= other_origin_index && other_pivot_index <= self.pivot_index
    }
}

/// Per-direction candidate origin from which a new leg is seeded (§3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingOrigin {
    pub price: f64,
    pub bar_index: u64,
    pub direction: LegDirection,
    pub source: PendingOriginSource,
}

/// Short tag describing how a `PendingOrigin` was seeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOriginSource {
    LookbackExtreme,
    PriorPivot,
}
