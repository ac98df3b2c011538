//! Property tests for detector/reference-layer invariants.
//!
//! Uses proptest to verify several of the testable properties:
//! 1. Bar-index monotonicity across `advance`
//! 2. Leg invariants (positive range, correct pivot/origin ordering)
//! 3. Breach determinism (replaying identical bars reproduces identical events)
//! 4. Bin distribution decile correctness
//! 5. Salience ordering stability (descending, stable leg_id tie-break)
//! 6. Direction imbalance definition

use proptest::prelude::*;

use swingref_core::bin_distribution::{BinDistribution, TOP_BIN};
use swingref_core::detector::DetectionConfig;
use swingref_core::domain::{Bar, IdGen, LegDirection, SessionSeed};
use swingref_core::reference::ReferenceConfig;
use swingref_core::Session;

fn arb_close_walk(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0..3.0_f64, len).prop_map(|deltas| {
        let mut price = 100.0;
        let mut out = Vec::with_capacity(deltas.len());
        for d in deltas {
            price = (price + d).max(1.0);
            out.push(price);
        }
        out
    })
}

fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            index: i as u64,
            timestamp: i as i64,
            open: c,
            high: c + 0.6,
            low: c - 0.6,
            close: c,
        })
        .collect()
}

fn fresh_session() -> Session {
    Session::init(
        DetectionConfig::default().with_lookback(3),
        ReferenceConfig::default().with_min_swings(1),
        SessionSeed(11),
    )
    .unwrap()
}

proptest! {
    /// Output snapshot indices equal input bar indices and are strictly
    /// monotone increasing (§8 property 1).
    #[test]
    fn snapshot_indices_are_monotone(closes in arb_close_walk(60)) {
        let bars = bars_from_closes(&closes);
        let mut session = fresh_session();
        let out = session.advance(&bars, true).unwrap();
        let snaps = out.snapshots.unwrap();
        prop_assert_eq!(snaps.len(), bars.len());
        for (expected, snap) in bars.iter().zip(snaps.iter()) {
            prop_assert_eq!(snap.bar_index, expected.index);
        }
        for window in snaps.windows(2) {
            prop_assert!(window[1].bar_index > window[0].bar_index);
        }
    }

    /// Every active leg after every bar has positive range and pivot/origin
    /// ordering consistent with its direction (§8 property 2).
    #[test]
    fn active_legs_satisfy_invariants(closes in arb_close_walk(80)) {
        let bars = bars_from_closes(&closes);
        let mut session = fresh_session();
        session.advance(&bars, false).unwrap();
        for leg in session.get_active_legs() {
            prop_assert!(leg.range > 0.0);
            prop_assert!(leg.pivot_index >= leg.origin_index);
            match leg.direction {
                LegDirection::Bull => prop_assert!(leg.pivot_price > leg.origin_price),
                LegDirection::Bear => prop_assert!(leg.pivot_price < leg.origin_price),
            }
        }
    }

    /// Replaying identical bars against identical config/seed reproduces
    /// identical lifecycle event sequences (§8 property 4, property 9 minus
    /// the leg_id determinism already covered by `domain::ids` tests).
    #[test]
    fn replaying_same_bars_reproduces_same_events(closes in arb_close_walk(50)) {
        let bars = bars_from_closes(&closes);
        let mut a = fresh_session();
        let mut b = fresh_session();
        let out_a = a.advance(&bars, false).unwrap();
        let out_b = b.advance(&bars, false).unwrap();
        prop_assert_eq!(out_a.events.len(), out_b.events.len());
        for (ea, eb) in out_a.events.iter().zip(out_b.events.iter()) {
            prop_assert_eq!(format!("{ea:?}"), format!("{eb:?}"));
        }
    }
}

proptest! {
    /// After adding N formed legs of known ranges, `bin_of(r)` matches the
    /// decile of `r` within the current window (§8 property 5).
    #[test]
    fn bin_of_matches_decile_rank(ranges in prop::collection::vec(0.1..1000.0_f64, 20..200)) {
        let mut dist = BinDistribution::new(i64::MAX / 2, 10_000);
        let mut gen = IdGen::new(SessionSeed(3));
        for (i, &r) in ranges.iter().enumerate() {
            let id = gen.next_leg_id(LegDirection::Bull, i as u64);
            dist.add_leg(id, r, i as i64);
        }
        let mut sorted = ranges.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for &r in &ranges {
            let rank = sorted.partition_point(|&x| x < r);
            let expected = ((rank as f64 / sorted.len() as f64) * 11.0).floor() as usize;
            prop_assert_eq!(dist.bin_of(r), expected.min(TOP_BIN));
        }
    }
}

proptest! {
    /// `references` is sorted descending by `salience_score` in every
    /// produced `ReferenceState` (§8 property 6).
    #[test]
    fn references_are_sorted_descending_by_salience(closes in arb_close_walk(120)) {
        let bars = bars_from_closes(&closes);
        let mut session = Session::init(
            DetectionConfig::default().with_lookback(3),
            ReferenceConfig::default().with_min_swings(1).with_top_n(20),
            SessionSeed(5),
        ).unwrap();
        session.advance(&bars, false).unwrap();
        let state = session.get_reference_state(None).unwrap();
        for window in state.references.windows(2) {
            prop_assert!(window[0].salience_score >= window[1].salience_score);
        }
    }

    /// `direction_imbalance` matches its definition against the realized
    /// by-direction counts (§8 property 7).
    #[test]
    fn direction_imbalance_matches_definition(closes in arb_close_walk(150)) {
        let bars = bars_from_closes(&closes);
        let mut session = Session::init(
            DetectionConfig::default().with_lookback(3),
            ReferenceConfig::default().with_min_swings(1).with_top_n(50),
            SessionSeed(9),
        ).unwrap();
        session.advance(&bars, false).unwrap();
        let state = session.get_reference_state(None).unwrap();
        let bull = state.by_direction.get(&LegDirection::Bull).map_or(0, Vec::len);
        let bear = state.by_direction.get(&LegDirection::Bear).map_or(0, Vec::len);
        let expected = if bull > 2 * bear && bull >= 2 {
            Some(LegDirection::Bull)
        } else if bear > 2 * bull && bear >= 2 {
            Some(LegDirection::Bear)
        } else {
            None
        };
        prop_assert_eq!(state.direction_imbalance, expected);
    }
}
