//! Leg detector — per-bar update protocol (§4.4).
//!
//! Owns a [`LegStore`] and drives it through the seven steps of `advance`:
//! append, confirm pivots, extend, seed, track breaches, classify terminal
//! states, emit events in creation-then-pruning order. No original-language
//! source exists for this exact DAG protocol (`DESIGN.md` notes the search);
//! the per-bar steps below follow `spec.md` §4.4 directly, grounded on
//! `incremental_detector.py`'s swing tie-break for pivot confirmation and on
//! `loop_runner.rs`'s phase-banner style for the per-bar method shape.

use crate::domain::{
    Bar, IdGen, Leg, LegDirection, LegId, LegStatus, LifecycleEvent, PruneReason, SessionSeed,
};
use crate::error::SessionError;

use super::config::DetectionConfig;
use super::leg_store::{ConfirmedPivot, LegStore};

pub struct LegDetector {
    config: DetectionConfig,
    store: LegStore,
    last_index: Option<u64>,
}

impl LegDetector {
    pub fn new(config: DetectionConfig, seed: SessionSeed) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            store: LegStore::new(config.lookback, IdGen::new(seed)),
            config,
            last_index: None,
        })
    }

    /// All legs ever created this session, carrying their current status
    /// (§9 "ownership of legs" — legs are never deleted, only transitioned).
    pub fn all_legs(&self) -> &[Leg] {
        &self.store.active_legs
    }

    /// Legs currently in `Active` status (§6.2 `get_active_legs`).
    pub fn active_legs(&self) -> impl Iterator<Item = &Leg> {
        self.store.active_legs.iter().filter(|l| l.status.is_active())
    }

    /// Write mutations the reference layer made to a cloned batch of active
    /// legs (currently just `formation_bar`, §3) back into the canonical
    /// store, matched by `leg_id`. `Session::advance` calls this right after
    /// `ReferenceLayer::update`, since that call only ever sees a clone.
    pub fn apply_formation_updates(&mut self, updated: &[Leg]) {
        for update in updated {
            if let Some(leg) = self
                .store
                .active_legs
                .iter_mut()
                .find(|l| l.leg_id == update.leg_id)
            {
                leg.formation_bar = update.formation_bar;
            }
        }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Adopt a new config at a safe point, between bars (§5). Rejects an
    /// invalid config, leaving the old one in effect (§7).
    pub fn update_config(&mut self, new_config: DetectionConfig) -> Result<(), SessionError> {
        new_config.validate()?;
        self.config = new_config;
        Ok(())
    }

    /// §4.4: process one new bar, returning the lifecycle events it produced.
    pub fn on_bar(&mut self, bar: &Bar) -> Result<Vec<LifecycleEvent>, SessionError> {
        bar.validate()
            .map_err(|source| SessionError::ShapeError { index: bar.index, source })?;
        if let Some(last) = self.last_index {
            if bar.index != last + 1 {
                return Err(SessionError::GapError {
                    expected: last + 1,
                    actual: bar.index,
                });
            }
        }
        self.last_index = Some(bar.index);

        let mut events = Vec::new();

        // Step 2: confirm pivots at i - lookback.
        let confirmed = self.store.push_bar(bar.index, bar.high, bar.low);

        // Step 3: extend same-direction active legs toward each confirmed pivot.
        for pivot in &confirmed {
            self.store.extend_active_legs(*pivot);
        }

        // Step 4: seed candidate legs from confirmed pivots + pending origins.
        for pivot in &confirmed {
            if let Some(idx) = self.store.try_seed_leg(*pivot, self.config.min_leg_range) {
                events.push(leg_created_event(&self.store.active_legs[idx], bar.index));
            }
        }

        // Step 5: update breach tracking against this bar's extremes.
        self.track_breaches(bar, &mut events);

        // Step 6: classify terminal states.
        self.classify_breach_terminals(bar.index, &mut events);
        self.prune_dominated_in_turn(bar.index, &mut events);
        self.prune_origin_proximate(bar.index, &mut events);

        Ok(events)
    }

    fn track_breaches(&mut self, bar: &Bar, events: &mut Vec<LifecycleEvent>) {
        for leg in self.store.active_legs.iter_mut() {
            if !leg.status.is_active() {
                continue;
            }
            leg.bar_count += 1;

            let (origin_extreme, origin_breach_amount, pivot_extreme, pivot_breach_amount) =
                match leg.direction {
                    LegDirection::Bull => (
                        bar.low,
                        (leg.origin_price - bar.low).max(0.0),
                        bar.high,
                        (bar.high - leg.pivot_price).max(0.0),
                    ),
                    LegDirection::Bear => (
                        bar.high,
                        (bar.high - leg.origin_price).max(0.0),
                        bar.low,
                        (leg.pivot_price - bar.low).max(0.0),
                    ),
                };

            if origin_breach_amount > leg.max_origin_breach.unwrap_or(0.0) {
                leg.max_origin_breach = Some(origin_breach_amount);
                events.push(LifecycleEvent::OriginBreached {
                    leg_id: leg.leg_id.clone(),
                    breach_price: origin_extreme,
                    bar_index: bar.index,
                    explanation: format!(
                        "origin breached by {origin_breach_amount:.6} past {:.6}",
                        leg.origin_price
                    ),
                });
            }
            if pivot_breach_amount > leg.max_pivot_breach.unwrap_or(0.0) {
                leg.max_pivot_breach = Some(pivot_breach_amount);
                events.push(LifecycleEvent::PivotBreached {
                    leg_id: leg.leg_id.clone(),
                    breach_price: pivot_extreme,
                    breach_amount: pivot_breach_amount,
                    bar_index: bar.index,
                    explanation: format!(
                        "pivot breached by {pivot_breach_amount:.6} past {:.6}",
                        leg.pivot_price
                    ),
                });
            }

            let continuation_distance = match leg.direction {
                LegDirection::Bull => (bar.high - leg.pivot_price).max(0.0),
                LegDirection::Bear => (leg.pivot_price - bar.low).max(0.0),
            };
            if leg.range > 0.0 && continuation_distance >= 2.0 * leg.range {
                leg.stale_bars += 1;
            } else {
                leg.stale_bars = 0;
            }
        }
    }

    fn classify_breach_terminals(&mut self, bar_index: u64, events: &mut Vec<LifecycleEvent>) {
        let engulfed_threshold = self.config.engulfed_breach_threshold;
        let pivot_tolerance = self.config.pivot_breach_tolerance;
        let stale_threshold = self.config.stale_extension_threshold;

        for leg in self.store.active_legs.iter_mut() {
            if !leg.status.is_active() {
                continue;
            }
            let origin_past_engulf =
                leg.max_origin_breach.unwrap_or(0.0) >= engulfed_threshold * leg.range;
            let pivot_past_engulf =
                leg.max_pivot_breach.unwrap_or(0.0) >= engulfed_threshold * leg.range;

            if origin_past_engulf && pivot_past_engulf {
                leg.status = LegStatus::Engulfed;
                events.push(prune_event(
                    leg.leg_id.clone(),
                    PruneReason::Engulfed,
                    "leg engulfed: both origin and pivot breached past tolerance",
                    bar_index,
                ));
            } else if leg.max_pivot_breach.unwrap_or(0.0) >= pivot_tolerance * leg.range {
                leg.status = LegStatus::PivotBreached;
                events.push(prune_event(
                    leg.leg_id.clone(),
                    PruneReason::PivotBreach,
                    "leg pruned: pivot breached past tolerance",
                    bar_index,
                ));
            } else if leg.stale_bars > stale_threshold {
                leg.status = LegStatus::Pruned;
                events.push(prune_event(
                    leg.leg_id.clone(),
                    PruneReason::ExtensionPrune,
                    "leg pruned: stale beyond 2x extension",
                    bar_index,
                ));
            }
        }
    }

    /// §4.4 step 6 "dominated in turn": a same-direction leg sharing the
    /// other's current `pivot_index` with range at least `max_turns` times
    /// larger supersedes it.
    fn prune_dominated_in_turn(&mut self, bar_index: u64, events: &mut Vec<LifecycleEvent>) {
        let max_turns = self.config.max_turns;
        let n = self.store.active_legs.len();
        let mut to_prune: Vec<usize> = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (a, b) = (&self.store.active_legs[i], &self.store.active_legs[j]);
                if !a.status.is_active() || !b.status.is_active() {
                    continue;
                }
                if a.direction != b.direction || a.pivot_index != b.pivot_index {
                    continue;
                }
                if a.range >= max_turns * b.range && a.range > b.range {
                    to_prune.push(j);
                } else if a.range == b.range && a.origin_index > b.origin_index {
                    // Exact tie: older (smaller origin_index) retained (§4.4 tie-break rule).
                    to_prune.push(i);
                }
            }
        }
        to_prune.sort_unstable();
        to_prune.dedup();
        for idx in to_prune {
            let leg = &mut self.store.active_legs[idx];
            if leg.status.is_active() {
                leg.status = LegStatus::Pruned;
                events.push(prune_event(
                    leg.leg_id.clone(),
                    PruneReason::DominatedInTurn,
                    "leg pruned: dominated by a larger-range leg at the same pivot",
                    bar_index,
                ));
            }
        }
    }

    /// §4.4 step 6 "origin/time proximity": two active same-direction legs
    /// whose origins are both too close in price and too close in time; the
    /// smaller-range leg is pruned.
    fn prune_origin_proximate(&mut self, bar_index: u64, events: &mut Vec<LifecycleEvent>) {
        let range_threshold = self.config.origin_range_prune_threshold;
        let time_threshold = self.config.origin_time_prune_threshold;
        let n = self.store.active_legs.len();
        let mut to_prune: Vec<usize> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.store.active_legs[i], &self.store.active_legs[j]);
                if !a.status.is_active() || !b.status.is_active() {
                    continue;
                }
                if a.direction != b.direction {
                    continue;
                }
                let max_range = a.range.max(b.range);
                if max_range <= 0.0 {
                    continue;
                }
                let price_close =
                    (a.origin_price - b.origin_price).abs() <= range_threshold * max_range;
                let time_close = a.origin_index.abs_diff(b.origin_index) <= time_threshold;
                if price_close && time_close {
                    let smaller = if a.range <= b.range { i } else { j };
                    to_prune.push(smaller);
                }
            }
        }
        to_prune.sort_unstable();
        to_prune.dedup();
        for idx in to_prune {
            let leg = &mut self.store.active_legs[idx];
            if leg.status.is_active() {
                leg.status = LegStatus::Pruned;
                events.push(prune_event(
                    leg.leg_id.clone(),
                    PruneReason::OriginRangePrune,
                    "leg pruned: origin too close in price and time to a larger leg",
                    bar_index,
                ));
            }
        }
    }
}

fn leg_created_event(leg: &Leg, bar_index: u64) -> LifecycleEvent {
    LifecycleEvent::LegCreated {
        leg_id: leg.leg_id.clone(),
        direction: leg.direction,
        origin_price: leg.origin_price,
        origin_index: leg.origin_index,
        pivot_price: leg.pivot_price,
        pivot_index: leg.pivot_index,
        bar_index,
        explanation: format!(
            "{:?} leg created: origin {:.6}@{} -> pivot {:.6}@{}",
            leg.direction, leg.origin_price, leg.origin_index, leg.pivot_price, leg.pivot_index
        ),
    }
}

fn prune_event(leg_id: LegId, reason: PruneReason, explanation: &str, bar_index: u64) -> LifecycleEvent {
    LifecycleEvent::LegPruned {
        leg_id,
        reason,
        explanation: explanation.to_string(),
        bar_index,
    }
}
