//! Sliding-window percentile classifier over formed-leg ranges (§4.2).
//!
//! Maintains an ordered multiset of `(timestamp, range)` pairs for legs that
//! have formed as references, and answers `bin_of(range)` in `O(log N)`
//! amortized by keeping a sorted `Vec<f64>` of ranges and binary-searching
//! it, with a periodic full rebuild (`recompute_interval`) that also evicts
//! stale entries — the same "rebuild on a cadence" approach `DESIGN.md`
//! attributes to an order-statistic tree, chosen here because a sorted
//! `Vec` needs no extra crate and the access pattern (many reads, occasional
//! batched writes) suits it.

use std::collections::HashSet;

use crate::domain::ids::LegId;

/// Number of bins the distribution classifies ranges into (§4.2): 0..10.
pub const N_BINS: usize = 11;

/// Bin id of the top decile (§4.6 `significant_bin_threshold` default, §8 S3/S4).
pub const TOP_BIN: usize = N_BINS - 1;

/// Default median used before any entries have been observed (§4.2).
const DEFAULT_MEDIAN: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Entry {
    timestamp: i64,
    range: f64,
}

/// Sliding-window ordered multiset of formed-leg ranges (§4.2).
#[derive(Debug, Clone)]
pub struct BinDistribution {
    window_duration: i64,
    recompute_interval: u64,
    entries: Vec<Entry>,
    sorted_ranges: Vec<f64>,
    seen_leg_ids: HashSet<LegId>,
    inserts_since_rebuild: u64,
    total_count: u64,
    last_timestamp: i64,
}

impl BinDistribution {
    pub fn new(window_duration: i64, recompute_interval: u64) -> Self {
        Self {
            window_duration,
            recompute_interval: recompute_interval.max(1),
            entries: Vec::new(),
            sorted_ranges: Vec::new(),
            seen_leg_ids: HashSet::new(),
            inserts_since_rebuild: 0,
            total_count: 0,
            last_timestamp: i64::MIN,
        }
    }

    /// Total number of distinct legs ever added to this distribution,
    /// including ones since evicted by the sliding window. Drives the
    /// warmup gate (§4.2 "until total_count >= min_swings_for_classification").
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Number of entries currently inside the window.
    pub fn window_len(&self) -> usize {
        self.entries.len()
    }

    /// Idempotent per `leg_id` (§4.2): a leg already recorded is not
    /// inserted twice, matching "once a leg is recorded here it is
    /// considered formed regardless of subsequent price action" (§3
    /// `FormedRefs`, which this distribution backs).
    pub fn add_leg(&mut self, leg_id: LegId, range: f64, timestamp: i64) {
        if self.seen_leg_ids.contains(&leg_id) {
            return;
        }
        self.seen_leg_ids.insert(leg_id);
        self.total_count += 1;
        self.last_timestamp = self.last_timestamp.max(timestamp);
        self.entries.push(Entry { timestamp, range });
        self.inserts_since_rebuild += 1;
        if self.inserts_since_rebuild >= self.recompute_interval {
            self.rebuild();
        } else {
            // Keep the sorted index usable between rebuilds via insertion sort
            // position — O(log N) search, O(N) shift, acceptable between the
            // periodic O(N log N) rebuilds that bound amortized cost (§4.2).
            let pos = self.sorted_ranges.partition_point(|&r| r < range);
            self.sorted_ranges.insert(pos, range);
        }
    }

    /// Removes entries older than `now - window_duration` (§4.2). Lazy: only
    /// called explicitly or as part of a rebuild, never on every `bin_of`.
    pub fn evict_before(&mut self, now: i64) {
        let cutoff = now - self.window_duration;
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp >= cutoff);
        if self.entries.len() != before {
            self.sorted_ranges = self.entries.iter().map(|e| e.range).collect();
            self.sorted_ranges
                .sort_by(|a, b| a.partial_cmp(b).unwrap());
            self.inserts_since_rebuild = 0;
        }
    }

    fn rebuild(&mut self) {
        self.evict_before(self.last_timestamp);
        self.sorted_ranges = self.entries.iter().map(|e| e.range).collect();
        self.sorted_ranges
            .sort_by(|a, b| a.partial_cmp(b).unwrap());
        self.inserts_since_rebuild = 0;
    }

    /// Decile bin (0..10) of `range` within the current window (§4.2).
    /// Ties use bisect-left semantics: an exact quantile-boundary value
    /// falls in the lower bin.
    pub fn bin_of(&self, range: f64) -> usize {
        let n = self.sorted_ranges.len();
        if n == 0 {
            return 0;
        }
        // bisect-left: index of the first element >= range.
        let rank = self.sorted_ranges.partition_point(|&r| r < range);
        let percentile = rank as f64 / n as f64;
        let bin = (percentile * N_BINS as f64).floor() as usize;
        bin.min(TOP_BIN)
    }

    /// 50th percentile of the current window, or [`DEFAULT_MEDIAN`] before
    /// any entries exist (§4.2).
    pub fn median(&self) -> f64 {
        let n = self.sorted_ranges.len();
        if n == 0 {
            return DEFAULT_MEDIAN;
        }
        if n % 2 == 1 {
            self.sorted_ranges[n / 2]
        } else {
            (self.sorted_ranges[n / 2 - 1] + self.sorted_ranges[n / 2]) / 2.0
        }
    }

    /// Moves this distribution's accumulated window/seen-set into a fresh
    /// instance built from `new_window_duration`/`new_recompute_interval`,
    /// consuming `self` (§5 `copy_state_from`: config swaps preserve
    /// accumulated distribution contents).
    pub fn copy_state_from(mut new: Self, old: Self) -> Self {
        new.entries = old.entries;
        new.sorted_ranges = old.sorted_ranges;
        new.seen_leg_ids = old.seen_leg_ids;
        new.total_count = old.total_count;
        new.last_timestamp = old.last_timestamp;
        new.inserts_since_rebuild = old.inserts_since_rebuild;
        new
    }
}

impl Default for BinDistribution {
    fn default() -> Self {
        // 30 days of 1-second bars is an arbitrary-but-generous default window;
        // callers size this from their own bar cadence via `DetectionConfig`.
        Self::new(30 * 24 * 3600, 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{IdGen, SessionSeed};
    use crate::domain::leg::LegDirection;

    fn ids(n: usize) -> Vec<LegId> {
        let mut gen = IdGen::new(SessionSeed(1));
        (0..n)
            .map(|i| gen.next_leg_id(LegDirection::Bull, i as u64))
            .collect()
    }

    #[test]
    fn empty_distribution_bins_to_zero() {
        let dist = BinDistribution::default();
        assert_eq!(dist.bin_of(5.0), 0);
        assert_eq!(dist.median(), DEFAULT_MEDIAN);
    }

    #[test]
    fn add_leg_is_idempotent_per_leg_id() {
        let mut dist = BinDistribution::default();
        let leg_ids = ids(1);
        dist.add_leg(leg_ids[0].clone(), 10.0, 100);
        dist.add_leg(leg_ids[0].clone(), 999.0, 200);
        assert_eq!(dist.total_count(), 1);
        assert_eq!(dist.window_len(), 1);
    }

    #[test]
    fn bin_of_decile_matches_sorted_rank() {
        let mut dist = BinDistribution::default();
        let leg_ids = ids(100);
        for (i, leg_id) in leg_ids.into_iter().enumerate() {
            dist.add_leg(leg_id, (i + 1) as f64, i as i64);
        }
        // Smallest range (1.0) is rank 0 of 100 -> bin 0.
        assert_eq!(dist.bin_of(1.0), 0);
        // Largest range (100.0) -> rank 99/100 = 0.99 -> bin 10 (top decile).
        assert_eq!(dist.bin_of(100.0), TOP_BIN);
        // A value tied exactly on a decile boundary takes the lower bin.
        assert_eq!(dist.bin_of(10.0), dist.bin_of(9.999999));
    }

    #[test]
    fn median_of_even_and_odd_counts() {
        let mut dist = BinDistribution::default();
        let leg_ids = ids(4);
        for (i, leg_id) in leg_ids.into_iter().enumerate() {
            dist.add_leg(leg_id, (i + 1) as f64, i as i64); // ranges 1,2,3,4
        }
        assert!((dist.median() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn evict_before_drops_stale_entries() {
        let mut dist = BinDistribution::new(100, 256);
        let leg_ids = ids(3);
        dist.add_leg(leg_ids[0].clone(), 1.0, 0);
        dist.add_leg(leg_ids[1].clone(), 2.0, 50);
        dist.add_leg(leg_ids[2].clone(), 3.0, 500);
        dist.evict_before(500);
        // window_duration=100, cutoff=400: only the bar-500 entry survives.
        assert_eq!(dist.window_len(), 1);
        // total_count is cumulative and unaffected by eviction.
        assert_eq!(dist.total_count(), 3);
    }

    #[test]
    fn rebuild_on_recompute_interval_preserves_bin_correctness() {
        let mut dist = BinDistribution::new(1_000_000, 4);
        let leg_ids = ids(10);
        for (i, leg_id) in leg_ids.into_iter().enumerate() {
            dist.add_leg(leg_id, (i + 1) as f64, i as i64);
        }
        assert_eq!(dist.window_len(), 10);
        assert_eq!(dist.bin_of(10.0), TOP_BIN);
    }
}
