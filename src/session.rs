//! Session — the `init`/`advance`/`reset`/query surface (§6.2), wiring the
//! detector, reference layer, level tracker, and snapshot buffer into one
//! serial, single-threaded unit (§5).
//!
//! Structured logging follows `loop_runner.rs`'s per-phase style: `debug!`
//! for each lifecycle event, `warn!` on pruning and fatal breaches, `error!`
//! on the two structural-input error kinds, via `tracing` (no `println!`
//! anywhere in this crate per `DESIGN.md`'s ambient-stack section).

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::detector::{DetectionConfig, LegDetector};
use crate::domain::{Bar, Event, Leg, LegId, LifecycleEvent, SessionSeed};
use crate::error::SessionError;
use crate::reference::{LevelTracker, ReferenceConfig, ReferenceLayer, ReferenceState};
use crate::snapshot::{RefStateSnapshot, SnapshotBuilder};

pub struct AdvanceOutput {
    pub events: Vec<Event>,
    pub snapshots: Option<Vec<RefStateSnapshot>>,
}

/// Ancestor ids, descendant ids, and the target leg's own depth (§6.2
/// `get_lineage`).
pub struct Lineage {
    pub ancestors: Vec<LegId>,
    pub descendants: Vec<LegId>,
    pub depth: u32,
}

pub struct Session {
    seed: SessionSeed,
    detection_config: DetectionConfig,
    detector: LegDetector,
    reference_layer: ReferenceLayer,
    level_tracker: LevelTracker,
    snapshots: SnapshotBuilder,
    last_state: Option<ReferenceState>,
}

impl Session {
    /// §6.2 `init`. `base_bar_index` is informational only here — gap
    /// checking is anchored on the first bar actually fed to `advance`.
    pub fn init(
        detection_config: DetectionConfig,
        reference_config: ReferenceConfig,
        seed: SessionSeed,
    ) -> Result<Self, SessionError> {
        detection_config.validate()?;
        reference_config.validate()?;
        let detector = LegDetector::new(detection_config.clone(), seed)?;
        Ok(Self {
            seed,
            detection_config,
            detector,
            reference_layer: ReferenceLayer::new(reference_config),
            level_tracker: LevelTracker::new(),
            snapshots: SnapshotBuilder::new(),
            last_state: None,
        })
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        self.detector.config()
    }

    pub fn reference_config(&self) -> &ReferenceConfig {
        self.reference_layer.config()
    }

    /// §6.2 `reset`: empties detector state but preserves `reference_config`
    /// (the accumulated bin distribution and formed-refs set are tied to
    /// legs that no longer exist, so they do not survive a reset — only the
    /// configuration record does).
    pub fn reset(&mut self) -> Result<(), SessionError> {
        self.detector = LegDetector::new(self.detection_config.clone(), self.seed)?;
        self.reference_layer = ReferenceLayer::new(self.reference_layer.config().clone());
        self.level_tracker = LevelTracker::new();
        self.snapshots.clear();
        self.last_state = None;
        Ok(())
    }

    /// §6.2 `update_detection_config`.
    pub fn update_detection_config(&mut self, new_config: DetectionConfig) -> Result<(), SessionError> {
        self.detector.update_config(new_config.clone())?;
        self.detection_config = new_config;
        Ok(())
    }

    /// §6.2 `update_reference_config`: adopts new parameters, preserving
    /// accumulated distribution/formed-refs state via `copy_state_from`
    /// (§5, §8 property 8).
    pub fn update_reference_config(&mut self, new_config: ReferenceConfig) -> Result<(), SessionError> {
        new_config.validate()?;
        let old = std::mem::replace(&mut self.reference_layer, ReferenceLayer::new(new_config.clone()));
        self.reference_layer = ReferenceLayer::new(new_config).copy_state_from(old);
        Ok(())
    }

    /// §4.9 advance loop: detector -> reference layer -> crossing tracker
    /// -> optional snapshot, for each bar in `bars`.
    pub fn advance(&mut self, bars: &[Bar], include_snapshots: bool) -> Result<AdvanceOutput, SessionError> {
        let mut events = Vec::new();
        let mut snapshots = if include_snapshots { Some(Vec::new()) } else { None };

        for bar in bars {
            let lifecycle_events = match self.detector.on_bar(bar) {
                Ok(evs) => evs,
                Err(err @ SessionError::GapError { .. }) => {
                    error!(bar_index = bar.index, %err, "bar index gap; advance aborted");
                    return Err(err);
                }
                Err(err @ SessionError::ShapeError { .. }) => {
                    error!(bar_index = bar.index, %err, "bar failed OHLC shape check; advance aborted");
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            for event in &lifecycle_events {
                match event {
                    LifecycleEvent::LegPruned { leg_id, reason, .. } => {
                        warn!(leg_id = %leg_id, reason = reason.as_str(), "leg pruned");
                    }
                    LifecycleEvent::OriginBreached { leg_id, .. } => {
                        warn!(leg_id = %leg_id, "origin breach recorded");
                    }
                    other => {
                        debug!(leg_id = %other.leg_id(), bar_index = other.bar_index(), "lifecycle event");
                    }
                }
            }

            // Detector's full leg history, active only: the reference layer
            // and level tracker both operate on currently-active legs.
            let mut active: Vec<Leg> = self.detector.active_legs().cloned().collect();
            let state = self.reference_layer.update(&mut active, bar);
            // `update` stamps `formation_bar` on its own clone of `active`;
            // write it back into the detector's canonical store.
            self.detector.apply_formation_updates(&active);

            let top_reference = state.references.first().map(|r| r.leg_id.clone());
            let legs_by_id: HashMap<LegId, &Leg> =
                active.iter().map(|l| (l.leg_id.clone(), l)).collect();
            let crossing_events = self
                .level_tracker
                .update(&legs_by_id, bar, top_reference.as_ref());

            if include_snapshots {
                let snapshot = RefStateSnapshot {
                    bar_index: bar.index,
                    close: bar.close,
                    reference_state: state.clone(),
                    formed_leg_ids: self.reference_layer.formed_leg_ids(),
                    level_crossings: crossing_events.clone(),
                    median: state.median,
                    auto_tracked_leg_id: self.level_tracker.auto_tracked_leg_id(top_reference.as_ref()),
                };
                self.snapshots.push(snapshot.clone());
                snapshots.as_mut().unwrap().push(snapshot);
            }

            events.extend(lifecycle_events.into_iter().map(Event::from));
            events.extend(crossing_events.into_iter().map(Event::from));
            self.last_state = Some(state);
        }

        Ok(AdvanceOutput { events, snapshots })
    }

    /// §6.2 `get_reference_state`.
    pub fn get_reference_state(&self, at_bar_index: Option<u64>) -> Result<ReferenceState, SessionError> {
        match at_bar_index {
            None => self.last_state.clone().ok_or(SessionError::NotInitialized),
            Some(index) => self
                .snapshots
                .get(index)
                .map(|s| s.reference_state.clone())
                .ok_or(SessionError::IndexOutOfRange {
                    requested: index,
                    current: self.last_state.as_ref().map_or(0, |s| s.bar_index),
                }),
        }
    }

    pub fn track(&mut self, leg_id: LegId) -> Result<(), SessionError> {
        self.level_tracker.track(leg_id)
    }

    pub fn untrack(&mut self, leg_id: &LegId) {
        self.level_tracker.untrack(leg_id);
    }

    /// §6.2 `get_active_legs`.
    pub fn get_active_legs(&self) -> Vec<Leg> {
        self.detector.active_legs().cloned().collect()
    }

    /// §6.2 `get_lineage`: ancestors/descendants via `parent_leg_id`.
    pub fn get_lineage(&self, leg_id: &LegId) -> Result<Lineage, SessionError> {
        let all = self.detector.all_legs();
        let by_id: HashMap<&LegId, &Leg> = all.iter().map(|l| (&l.leg_id, l)).collect();

        let target = *by_id.get(leg_id).ok_or_else(|| SessionError::LegNotFound {
            leg_id: leg_id.as_str().to_string(),
        })?;

        let mut ancestors = Vec::new();
        let mut cursor = target.parent_leg_id.clone();
        while let Some(id) = cursor {
            ancestors.push(id.clone());
            cursor = by_id.get(&id).and_then(|l| l.parent_leg_id.clone());
        }

        let mut descendants = Vec::new();
        for leg in all {
            let mut cursor = leg.parent_leg_id.clone();
            while let Some(id) = cursor {
                if &id == leg_id {
                    descendants.push(leg.leg_id.clone());
                    break;
                }
                cursor = by_id.get(&id).and_then(|l| l.parent_leg_id.clone());
            }
        }

        Ok(Lineage {
            ancestors,
            descendants,
            depth: target.depth,
        })
    }

    /// §12 confluence zones over the currently tracked legs.
    pub fn confluence_zones(&self) -> Vec<crate::reference::ConfluenceZone> {
        let active = self.get_active_legs();
        let refs: Vec<&Leg> = active.iter().collect();
        self.level_tracker
            .confluence_zones(&refs, self.reference_layer.config().confluence_tolerance_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(index: u64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar {
            index,
            timestamp: index as i64,
            open: o,
            high: h,
            low: l,
            close: c,
        }
    }

    fn session() -> Session {
        Session::init(
            DetectionConfig::default().with_lookback(2),
            ReferenceConfig::default().with_min_swings(1),
            SessionSeed(1),
        )
        .unwrap()
    }

    #[test]
    fn advance_is_monotone_and_gap_free() {
        let mut s = session();
        let bars: Vec<Bar> = (0..10)
            .map(|i| bar(i, 100.0, 101.0, 99.0, 100.0 + i as f64 * 0.1))
            .collect();
        let out = s.advance(&bars, true).unwrap();
        assert!(out.snapshots.is_some());
        let snaps = out.snapshots.unwrap();
        let indices: Vec<u64> = snaps.iter().map(|s| s.bar_index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn gap_in_bar_index_is_rejected() {
        let mut s = session();
        let bars = vec![bar(0, 100.0, 101.0, 99.0, 100.0), bar(2, 100.0, 101.0, 99.0, 100.0)];
        let err = s.advance(&bars, false).unwrap_err();
        assert!(matches!(err, SessionError::GapError { .. }));
    }

    #[test]
    fn reset_clears_snapshots_and_state() {
        let mut s = session();
        let bars: Vec<Bar> = (0..5).map(|i| bar(i, 100.0, 101.0, 99.0, 100.0)).collect();
        s.advance(&bars, true).unwrap();
        s.reset().unwrap();
        assert!(s.get_reference_state(None).is_err());
    }

    #[test]
    fn lineage_reports_target_depth() {
        let mut s = session();
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let c = 100.0 + (i as f64 - 10.0).abs();
                bar(i, c, c + 0.5, c - 0.5, c)
            })
            .collect();
        s.advance(&bars, false).unwrap();
        let legs = s.get_active_legs();
        if let Some(leg) = legs.first() {
            let lineage = s.get_lineage(&leg.leg_id).unwrap();
            assert_eq!(lineage.depth, leg.depth);
        }
    }

    #[test]
    fn active_legs_report_formation_bar_once_formed() {
        // A sustained V then a long run back up forms the initial bear leg
        // and should leave its formation_bar populated in get_active_legs.
        let mut s = session();
        let down: Vec<Bar> = (0..5).map(|i| bar(i, 100.0 - i as f64, 101.0 - i as f64, 99.0 - i as f64, 100.0 - i as f64)).collect();
        let up: Vec<Bar> = (5..30).map(|i| {
            let c = 96.0 + (i - 5) as f64 * 0.5;
            bar(i, c, c + 0.5, c - 0.5, c)
        }).collect();
        s.advance(&down, false).unwrap();
        s.advance(&up, false).unwrap();
        let legs = s.get_active_legs();
        assert!(
            legs.iter().any(|l| l.is_formed() && l.formation_bar.is_some()),
            "at least one active leg should have formed and carry its formation_bar"
        );
    }
}
