//! Reference-layer configuration — filter/classify/score tunables (§4.6, §12).
//!
//! Field names and the frozen-record-plus-`with_*`-builder shape are grounded
//! on `reference_config.py`'s `ReferenceConfig` dataclass; its specific
//! salience-weight values are superseded here by `spec.md` §4.6's own
//! defaults (see `DESIGN.md`), but `confluence_tolerance_pct` and
//! `active_level_distance_pct` are carried over as-is for the §12 confluence
//! supplement. `BinDistribution` lives behind this config (§5: "the bin
//! distribution is internal to the reference layer").

use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq)]
pub struct SalienceWeights {
    pub range: f64,
    pub counter: f64,
    pub range_counter: f64,
    /// Weight on `impulse_score`. The detector never populates
    /// `Leg::impulsiveness`, so this weight is always redistributed across
    /// the other terms rather than ever applied — see
    /// `salience::redistribute_impulse_weight`.
    pub impulse: f64,
    pub recency: f64,
    pub depth: f64,
}

impl Default for SalienceWeights {
    fn default() -> Self {
        Self {
            range: 0.8,
            counter: 0.0,
            range_counter: 0.0,
            impulse: 0.3,
            recency: 0.4,
            depth: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceConfig {
    /// Top-N formed, non-breached legs kept as `references` (§4.6 step 6). Default 5.
    pub top_n: usize,
    /// Minimum bin (inclusive) for a reference to be "significant" (§4.6 step 8). Default 8.
    pub significant_bin_threshold: usize,
    /// Location at which a leg becomes formed, sticky thereafter (§4.6 step 1). Default 0.382.
    pub formation_fib_threshold: f64,
    /// Extra tolerance past `location=1` before a small (bin < threshold) ref is fatally breached.
    pub small_origin_tolerance: f64,
    /// Extreme-wick tolerance past `location=1` for a significant ref (§4.6 step 3).
    pub big_trade_breach_tolerance: f64,
    /// Close-based tolerance past `location=1` for a significant ref (§4.6 step 3).
    pub big_close_breach_tolerance: f64,
    pub salience_weights: SalienceWeights,
    /// Bars over which `recency_score` decays by half (§4.6 step 5). Default 1000.
    pub recency_decay_bars: f64,
    /// Per-depth-level decay factor for `depth_score` (§4.6 step 5). Default 0.5.
    pub depth_decay_factor: f64,
    /// Formed-leg count below which the layer reports `is_warming_up=true` (§4.2). Default 50.
    pub min_swings_for_classification: u64,
    /// Sliding-window duration (bar-timestamp units) for `BinDistribution` (§4.2, §5).
    pub bin_window_duration: i64,
    /// Bulk-rebuild cadence for `BinDistribution` (§4.2).
    pub bin_recompute_interval: u64,
    /// Price-distance tolerance (fraction of level price) within which two
    /// tracked levels are grouped into one confluence zone (§12).
    pub confluence_tolerance_pct: f64,
    /// Price-distance tolerance (fraction of level price) within which a
    /// level is considered "active"/near current price (§12).
    pub active_level_distance_pct: f64,
}

impl ReferenceConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.top_n == 0 {
            return Err(SessionError::ConfigInvalid {
                reason: "top_n must be >= 1".into(),
            });
        }
        if self.min_swings_for_classification < 1 {
            return Err(SessionError::ConfigInvalid {
                reason: "min_swings_for_classification must be >= 1".into(),
            });
        }
        let weights = &self.salience_weights;
        if weights.range < 0.0
            || weights.counter < 0.0
            || weights.range_counter < 0.0
            || weights.impulse < 0.0
            || weights.recency < 0.0
            || weights.depth < 0.0
        {
            return Err(SessionError::ConfigInvalid {
                reason: "salience weights must be non-negative".into(),
            });
        }
        if self.formation_fib_threshold < 0.0 {
            return Err(SessionError::ConfigInvalid {
                reason: "formation_fib_threshold must be non-negative".into(),
            });
        }
        Ok(())
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_significant_bin_threshold(mut self, threshold: usize) -> Self {
        self.significant_bin_threshold = threshold;
        self
    }

    pub fn with_formation_threshold(mut self, formation_fib_threshold: f64) -> Self {
        self.formation_fib_threshold = formation_fib_threshold;
        self
    }

    pub fn with_tolerances(
        mut self,
        small_origin_tolerance: f64,
        big_trade_breach_tolerance: f64,
        big_close_breach_tolerance: f64,
    ) -> Self {
        self.small_origin_tolerance = small_origin_tolerance;
        self.big_trade_breach_tolerance = big_trade_breach_tolerance;
        self.big_close_breach_tolerance = big_close_breach_tolerance;
        self
    }

    pub fn with_salience_weights(mut self, weights: SalienceWeights) -> Self {
        self.salience_weights = weights;
        self
    }

    pub fn with_depth_decay(mut self, recency_decay_bars: f64, depth_decay_factor: f64) -> Self {
        self.recency_decay_bars = recency_decay_bars;
        self.depth_decay_factor = depth_decay_factor;
        self
    }

    pub fn with_min_swings(mut self, min_swings_for_classification: u64) -> Self {
        self.min_swings_for_classification = min_swings_for_classification;
        self
    }

    pub fn with_bin_window(mut self, bin_window_duration: i64, bin_recompute_interval: u64) -> Self {
        self.bin_window_duration = bin_window_duration;
        self.bin_recompute_interval = bin_recompute_interval;
        self
    }

    pub fn with_confluence_tolerance(mut self, confluence_tolerance_pct: f64) -> Self {
        self.confluence_tolerance_pct = confluence_tolerance_pct;
        self
    }

    pub fn with_active_level_distance(mut self, active_level_distance_pct: f64) -> Self {
        self.active_level_distance_pct = active_level_distance_pct;
        self
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            significant_bin_threshold: 8,
            formation_fib_threshold: 0.382,
            small_origin_tolerance: 0.0,
            big_trade_breach_tolerance: 0.15,
            big_close_breach_tolerance: 0.10,
            salience_weights: SalienceWeights::default(),
            recency_decay_bars: 1000.0,
            depth_decay_factor: 0.5,
            min_swings_for_classification: 50,
            bin_window_duration: 30 * 24 * 3600,
            bin_recompute_interval: 256,
            confluence_tolerance_pct: 0.001,
            active_level_distance_pct: 0.005,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ReferenceConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_top_n_is_invalid() {
        assert!(ReferenceConfig::default().with_top_n(0).validate().is_err());
    }

    #[test]
    fn zero_min_swings_is_invalid() {
        assert!(ReferenceConfig::default()
            .with_min_swings(0)
            .validate()
            .is_err());
    }

    #[test]
    fn negative_salience_weight_is_invalid() {
        let mut weights = SalienceWeights::default();
        weights.range = -1.0;
        assert!(ReferenceConfig::default()
            .with_salience_weights(weights)
            .validate()
            .is_err());
    }

    #[test]
    fn builder_changes_only_named_fields() {
        let cfg = ReferenceConfig::default().with_top_n(3);
        assert_eq!(cfg.top_n, 3);
        assert_eq!(cfg.significant_bin_threshold, 8);
    }
}
