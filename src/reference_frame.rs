//! Reference frame — maps a price to a normalized location within a leg (§4.1).
//!
//! `location` is 0 at the pivot, 1 at the origin, 2 at the completion target
//! one full range past the origin, and negative once price has pushed past
//! the pivot in the trend-continuation direction (never having retraced).
//! Grounded on `spec.md` S2 (a bear leg, origin=110, pivot=100, range=10,
//! forms exactly at close=103.82 -> location=0.382), which pins the sign
//! convention: `spec.md` §4.1's own algebraic aside contradicts its stated
//! "0 at pivot, 1 at origin" invariant, but S2 only checks out against the
//! invariant, so the invariant wins here (see `DESIGN.md`).
//!
//! For a bull leg (origin is the older low, pivot the newer high), location
//! increases as price falls back from the pivot toward the origin. For a
//! bear leg (origin the older high, pivot the newer low), location
//! increases as price rises back from the pivot toward the origin.

use crate::domain::{Leg, LegDirection};

/// Small uniform epsilon for the `location >= 2.0` completion cutoff (§9
/// Open Questions: "implementers should choose a single small ε ... and use
/// it uniformly").
pub const COMPLETION_EPSILON: f64 = 1e-9;

/// Raw (uncapped) location of `price` relative to `leg`.
///
/// Never use the raw value for the field exposed to consumers — always go
/// through [`capped_location`] for anything that leaves this module's
/// internal breach/completion tests.
pub fn raw_location(leg: &Leg, price: f64) -> f64 {
    match leg.direction {
        LegDirection::Bull => (leg.pivot_price - price) / leg.range,
        LegDirection::Bear => (price - leg.pivot_price) / leg.range,
    }
}

/// The location field as exposed to consumers: capped at 2.0 (§4.1, §4.8).
pub fn capped_location(leg: &Leg, price: f64) -> f64 {
    raw_location(leg, price).min(2.0)
}

/// Price crossed back past the defended pivot.
pub fn is_pivot_breached(location: f64) -> bool {
    location < 0.0
}

/// Price reached one full range past the origin.
pub fn is_completed(location: f64) -> bool {
    location > 2.0 + COMPLETION_EPSILON
}

/// Price at a given location for this leg (inverse of [`raw_location`]).
/// Used by the level tracker to render fib levels as absolute prices.
pub fn price_at_location(leg: &Leg, location: f64) -> f64 {
    match leg.direction {
        LegDirection::Bull => leg.pivot_price + location * leg.range,
        LegDirection::Bear => leg.pivot_price - location * leg.range,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{IdGen, SessionSeed};

    fn bull_leg() -> Leg {
        let mut gen = IdGen::new(SessionSeed(1));
        let id = gen.next_leg_id(LegDirection::Bull, 0);
        Leg::new(id, LegDirection::Bull, 95.0, 10, 100.0, 15, 0, None)
    }

    fn bear_leg() -> Leg {
        let mut gen = IdGen::new(SessionSeed(1));
        let id = gen.next_leg_id(LegDirection::Bear, 0);
        Leg::new(id, LegDirection::Bear, 105.0, 5, 95.0, 10, 0, None)
    }

    #[test]
    fn bear_location_matches_formation_example() {
        let leg = Leg::new(
            {
                let mut gen = IdGen::new(SessionSeed(1));
                gen.next_leg_id(LegDirection::Bear, 10)
            },
            LegDirection::Bear,
            110.0,
            10,
            100.0,
            15,
            0,
            None,
        );
        // origin=110, pivot=100, range=10. At p=pivot, location=0; at p=origin, location=1.
        assert!((raw_location(&leg, 100.0) - 0.0).abs() < 1e-9);
        assert!((raw_location(&leg, 110.0) - 1.0).abs() < 1e-9);
        // close=103.82 -> location=(103.82-100)/10=0.382, the formation threshold.
        assert!((raw_location(&leg, 103.82) - 0.382).abs() < 1e-9);
    }

    #[test]
    fn bull_location_at_pivot_and_origin() {
        let leg = bull_leg();
        assert!((raw_location(&leg, 100.0) - 0.0).abs() < 1e-9);
        assert!((raw_location(&leg, 95.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn completion_at_two_full_ranges() {
        let leg = bull_leg();
        // completion target = pivot + 2*range = 100 + 10 = 110
        let target_price = price_at_location(&leg, 2.0);
        assert!((raw_location(&leg, target_price) - 2.0).abs() < 1e-9);
        assert!(is_completed(raw_location(&leg, target_price + 0.01)));
        assert!(!is_completed(raw_location(&leg, target_price)));
    }

    #[test]
    fn pivot_breach_is_negative_location() {
        let leg = bull_leg();
        // pivot=100; pushing past it in the trend direction (without retracing) breaches it.
        assert!(is_pivot_breached(raw_location(&leg, 101.0)));
        assert!(!is_pivot_breached(raw_location(&leg, 100.0)));
        assert!(!is_pivot_breached(raw_location(&leg, 99.0)));
    }

    #[test]
    fn capped_location_never_exceeds_two() {
        let leg = bull_leg();
        assert_eq!(capped_location(&leg, 1_000_000.0), 2.0);
    }
}
