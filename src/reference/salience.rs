//! Salience scoring — weighted sum of non-negative component scores (§4.6 step 5).

use crate::domain::Leg;

use super::config::SalienceWeights;

/// Per-leg inputs to salience that the reference layer must supply
/// alongside the leg itself: the leg's age and the distribution median.
#[derive(Debug, Clone, Copy)]
pub struct SalienceInputs {
    pub age_bars: u64,
    pub median: f64,
    pub recency_decay_bars: f64,
    pub depth_decay_factor: f64,
}

/// Weighted-sum salience score for one leg (§4.6 step 5). Scores are not
/// clamped — an exceptional leg can score above what "1.0 per component"
/// might suggest.
pub fn compute_salience(leg: &Leg, inputs: SalienceInputs, weights: &SalienceWeights) -> f64 {
    let denom = 25.0 * inputs.median.max(f64::EPSILON);
    let range_score = leg.range / denom;
    let counter_range = leg.counter_range.unwrap_or(0.0);
    let counter_score = counter_range / denom;
    let range_counter_score = (leg.range * counter_range) / (denom * denom);
    let recency_score = 1.0 / (1.0 + inputs.age_bars as f64 / inputs.recency_decay_bars.max(1.0));
    let depth_score = 1.0 / (1.0 + leg.depth as f64 * inputs.depth_decay_factor);

    let (effective, impulse_score) = match leg.impulsiveness {
        Some(impulsiveness) => (weights.clone(), impulsiveness / 100.0),
        None => (redistribute_impulse_weight(weights), 0.0),
    };

    effective.range * range_score
        + effective.counter * counter_score
        + effective.range_counter * range_counter_score
        + effective.impulse * impulse_score
        + effective.recency * recency_score
        + effective.depth * depth_score
}

/// §4.6 step 5: "If `impulsiveness` is missing on a leg, the impulse weight
/// is redistributed proportionally across the other weights in use." Other
/// weights already at zero get none of it; if every other weight is zero the
/// impulse weight is simply dropped (nothing to redistribute onto).
fn redistribute_impulse_weight(weights: &SalienceWeights) -> SalienceWeights {
    let others_total = weights.range + weights.counter + weights.range_counter + weights.recency + weights.depth;
    if others_total <= 0.0 {
        let mut w = weights.clone();
        w.impulse = 0.0;
        return w;
    }
    let share = weights.impulse / others_total;
    SalienceWeights {
        range: weights.range + weights.range * share,
        counter: weights.counter + weights.counter * share,
        range_counter: weights.range_counter + weights.range_counter * share,
        impulse: 0.0,
        recency: weights.recency + weights.recency * share,
        depth: weights.depth + weights.depth * share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IdGen, LegDirection, SessionSeed};

    fn leg() -> Leg {
        let mut gen = IdGen::new(SessionSeed(1));
        let id = gen.next_leg_id(LegDirection::Bull, 0);
        Leg::new(id, LegDirection::Bull, 90.0, 0, 100.0, 10, 0, None)
    }

    fn inputs() -> SalienceInputs {
        SalienceInputs {
            age_bars: 0,
            median: 1.0,
            recency_decay_bars: 1000.0,
            depth_decay_factor: 0.5,
        }
    }

    #[test]
    fn missing_impulsiveness_redistributes_its_weight() {
        let mut l = leg();
        l.impulsiveness = None;
        let weights = SalienceWeights::default();
        let score = compute_salience(&l, inputs(), &weights);
        // With impulse score 0 and weight 0, redistribution should not change
        // the result versus leaving the weight in place and scoring 0 for it,
        // UNLESS other weights are nonzero (they are: range/recency here), so
        // the redistributed score must be strictly greater than naive-zero.
        let naive = weights.range * (l.range / (25.0 * inputs().median))
            + weights.recency * 1.0;
        assert!(score > 0.0);
        assert!(score >= naive * 0.99);
    }

    #[test]
    fn default_impulse_weight_is_never_applied_by_the_detector() {
        // `Leg::new` always leaves `impulsiveness: None` (the detector never
        // computes it, §9 open question), so `SalienceWeights::default`'s
        // non-zero `impulse` weight is always redistributed away rather than
        // ever scoring an actual impulsiveness reading. This pins that
        // behavior so a future detector that *does* populate `impulsiveness`
        // is a deliberate, visible change here.
        let l = leg();
        assert!(l.impulsiveness.is_none());
        let weights = SalienceWeights::default();
        assert!(weights.impulse > 0.0);
        let redistributed = redistribute_impulse_weight(&weights);
        assert_eq!(redistributed.impulse, 0.0);
    }

    #[test]
    fn present_impulsiveness_uses_its_own_weight_unmodified() {
        let mut l = leg();
        l.impulsiveness = Some(50.0);
        let weights = SalienceWeights::default();
        let score = compute_salience(&l, inputs(), &weights);
        assert!(score > 0.0);
    }

    #[test]
    fn higher_range_yields_higher_salience_all_else_equal() {
        let mut small = leg();
        small.impulsiveness = Some(10.0);
        let mut big = leg();
        big.impulsiveness = Some(10.0);
        big.range = small.range * 10.0;
        let weights = SalienceWeights::default();
        assert!(
            compute_salience(&big, inputs(), &weights)
                > compute_salience(&small, inputs(), &weights)
        );
    }

    #[test]
    fn older_leg_scores_lower_recency_component() {
        let mut l = leg();
        l.impulsiveness = Some(0.0);
        let weights = SalienceWeights {
            range: 0.0,
            counter: 0.0,
            range_counter: 0.0,
            impulse: 0.0,
            recency: 1.0,
            depth: 0.0,
        };
        let young = compute_salience(&l, SalienceInputs { age_bars: 0, ..inputs() }, &weights);
        let old = compute_salience(&l, SalienceInputs { age_bars: 5000, ..inputs() }, &weights);
        assert!(young > old);
    }
}
