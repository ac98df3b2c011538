//! Level crossing tracker (§4.7) and confluence-zone grouping (§12).
//!
//! Crossings are computed against the previous bar's close only — never a
//! full rescan — matching §4.7's "not a full scan per advance" performance
//! note and `loop_runner.rs`'s general preference for O(1) per-bar state
//! carried forward rather than recomputed from history.

use std::collections::HashMap;

use crate::domain::{CrossDirection, Bar, Leg, LegId, LevelCrossEvent};
use crate::error::SessionError;
use crate::reference_frame;

/// Fibonacci ratios tracked for level crossings (§4.7).
pub const FIB_RATIOS: [f64; 9] = [0.0, 0.382, 0.5, 0.618, 1.0, 1.382, 1.5, 1.618, 2.0];

/// Cap on manually pinned tracked legs (§6.2 `track`).
pub const TRACK_CAP: usize = 10;

/// A group of tracked levels (possibly from different legs) whose prices
/// fall within `confluence_tolerance_pct` of each other (§12).
#[derive(Debug, Clone)]
pub struct ConfluenceZone {
    pub price: f64,
    pub members: Vec<(LegId, f64)>,
}

pub struct LevelTracker {
    tracked: Vec<LegId>,
    prev_close: Option<f64>,
}

impl LevelTracker {
    pub fn new() -> Self {
        Self {
            tracked: Vec::new(),
            prev_close: None,
        }
    }

    pub fn tracked_ids(&self) -> &[LegId] {
        &self.tracked
    }

    /// §6.2 `track`: pin a leg id for crossing detection, capped at
    /// [`TRACK_CAP`].
    pub fn track(&mut self, leg_id: LegId) -> Result<(), SessionError> {
        if self.tracked.contains(&leg_id) {
            return Ok(());
        }
        if self.tracked.len() >= TRACK_CAP {
            return Err(SessionError::TrackingCapExceeded { cap: TRACK_CAP });
        }
        self.tracked.push(leg_id);
        Ok(())
    }

    pub fn untrack(&mut self, leg_id: &LegId) {
        self.tracked.retain(|id| id != leg_id);
    }

    /// §4.7 auto-track selection: the first manually pinned leg if any exist,
    /// else the current bar's top reference.
    pub fn auto_tracked_leg_id(&self, top_reference: Option<&LegId>) -> Option<LegId> {
        if let Some(first) = self.tracked.first() {
            return Some(first.clone());
        }
        top_reference.cloned()
    }

    /// §4.7: compute crossing events for this bar against the previous bar's
    /// close, for every effectively tracked leg (manual pins, or the
    /// auto-tracked leg if none are pinned).
    pub fn update(
        &mut self,
        legs_by_id: &HashMap<LegId, &Leg>,
        bar: &Bar,
        top_reference: Option<&LegId>,
    ) -> Vec<LevelCrossEvent> {
        let mut events = Vec::new();
        let effective: Vec<LegId> = if !self.tracked.is_empty() {
            self.tracked.clone()
        } else {
            self.auto_tracked_leg_id(top_reference).into_iter().collect()
        };

        if let Some(prev_close) = self.prev_close {
            for leg_id in &effective {
                let Some(leg) = legs_by_id.get(leg_id) else {
                    continue;
                };
                for ratio in FIB_RATIOS {
                    let level_price = reference_frame::price_at_location(leg, ratio);
                    let direction = if prev_close < level_price && bar.close >= level_price {
                        Some(CrossDirection::Up)
                    } else if prev_close > level_price && bar.close <= level_price {
                        Some(CrossDirection::Down)
                    } else {
                        None
                    };
                    if let Some(cross_direction) = direction {
                        events.push(LevelCrossEvent {
                            leg_id: (*leg_id).clone(),
                            direction: leg.direction,
                            level_crossed: ratio,
                            cross_direction,
                            bar_index: bar.index,
                            timestamp: bar.timestamp,
                            explanation: format!(
                                "close crossed {ratio:.3} level at {level_price:.6}"
                            ),
                        });
                    }
                }
            }
        }

        self.prev_close = Some(bar.close);
        events
    }

    /// §12: group tracked legs' fib level prices into confluence zones —
    /// clusters of levels (possibly from different legs) within
    /// `confluence_tolerance_pct` of each other.
    pub fn confluence_zones(&self, legs: &[&Leg], confluence_tolerance_pct: f64) -> Vec<ConfluenceZone> {
        let mut points: Vec<(LegId, f64)> = Vec::new();
        for leg in legs {
            if !self.tracked.contains(&leg.leg_id) {
                continue;
            }
            for ratio in FIB_RATIOS {
                points.push((leg.leg_id.clone(), reference_frame::price_at_location(leg, ratio)));
            }
        }
        points.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let mut zones: Vec<ConfluenceZone> = Vec::new();
        for (leg_id, price) in points {
            if let Some(last) = zones.last_mut() {
                let tolerance = confluence_tolerance_pct * last.price.abs().max(f64::EPSILON);
                if (price - last.price).abs() <= tolerance {
                    last.members.push((leg_id, price));
                    continue;
                }
            }
            zones.push(ConfluenceZone {
                price,
                members: vec![(leg_id, price)],
            });
        }
        zones.retain(|z| z.members.len() > 1);
        zones
    }
}

impl Default for LevelTracker {
    fn default() -> Self {
        Self::new()
    }
}
