//! Detector configuration — immutable parameter record with builder updates (§5, §9).
//!
//! Field names mirror the replay-server config surface the original
//! implementation exposes over HTTP (`stale_extension_threshold`,
//! `origin_range_prune_threshold`/`origin_time_prune_threshold`, `max_turns`,
//! `engulfed_breach_threshold`), generalized here into one frozen Rust struct
//! with `with_*` builders in the style of `EngineConfig`/`ExecutionConfig`.

use crate::error::SessionError;

/// Tunable parameters for the leg detector (§4.3, §4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Symmetric pivot-detection lookback `L` (§4.3). Default 5.
    pub lookback: u32,
    /// Minimum implied range for a candidate leg to be seeded (§4.4 step 4).
    pub min_leg_range: f64,
    /// Fraction of `range` that both origin and pivot must be breached past
    /// before a leg is marked `engulfed` (§4.4 step 6).
    pub engulfed_breach_threshold: f64,
    /// Fraction of `range` price may cross the pivot before `pivot_breached` (§4.4 step 6).
    pub pivot_breach_tolerance: f64,
    /// Bars at or beyond 2x extension before a stale leg is pruned (§4.4 step 6).
    pub stale_extension_threshold: u64,
    /// Dominance factor a new same-direction leg's range must meet or exceed
    /// over an older leg at the same pivot to prune the older one (§4.4 step 6).
    pub max_turns: f64,
    /// Fraction of `max(range)` within which two same-direction origins are
    /// considered too close, pruning the smaller leg (§4.4 step 6).
    pub origin_range_prune_threshold: f64,
    /// Bars within which two same-direction origins are considered too close
    /// in time, pruning the smaller leg (§4.4 step 6).
    pub origin_time_prune_threshold: u64,
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.lookback == 0 {
            return Err(SessionError::ConfigInvalid {
                reason: "lookback must be >= 1".into(),
            });
        }
        if self.min_leg_range < 0.0
            || self.engulfed_breach_threshold < 0.0
            || self.pivot_breach_tolerance < 0.0
            || self.max_turns < 0.0
            || self.origin_range_prune_threshold < 0.0
        {
            return Err(SessionError::ConfigInvalid {
                reason: "detection thresholds must be non-negative".into(),
            });
        }
        Ok(())
    }

    pub fn with_lookback(mut self, lookback: u32) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_min_leg_range(mut self, min_leg_range: f64) -> Self {
        self.min_leg_range = min_leg_range;
        self
    }

    pub fn with_engulfed(mut self, engulfed_breach_threshold: f64) -> Self {
        self.engulfed_breach_threshold = engulfed_breach_threshold;
        self
    }

    pub fn with_pivot_breach_tolerance(mut self, pivot_breach_tolerance: f64) -> Self {
        self.pivot_breach_tolerance = pivot_breach_tolerance;
        self
    }

    pub fn with_stale_extension(mut self, stale_extension_threshold: u64) -> Self {
        self.stale_extension_threshold = stale_extension_threshold;
        self
    }

    pub fn with_max_turns(mut self, max_turns: f64) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_origin_prune(
        mut self,
        origin_range_prune_threshold: f64,
        origin_time_prune_threshold: u64,
    ) -> Self {
        self.origin_range_prune_threshold = origin_range_prune_threshold;
        self.origin_time_prune_threshold = origin_time_prune_threshold;
        self
    }

}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            lookback: 5,
            min_leg_range: 0.0,
            engulfed_breach_threshold: 0.25,
            pivot_breach_tolerance: 0.05,
            stale_extension_threshold: 200,
            max_turns: 1.5,
            origin_range_prune_threshold: 0.1,
            origin_time_prune_threshold: 10,
        }
    }
}
