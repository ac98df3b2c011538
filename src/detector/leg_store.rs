//! Leg store — owns active legs, per-direction pending origins, and the
//! lookback sliding window used for pivot confirmation (§3, §4.3).
//!
//! Pivot confirmation needs, for each arriving bar, the answer to "is the
//! bar `lookback` positions back a swing high/low". `window` holds exactly
//! the `2*lookback + 1` most recent bars, which is all the symmetric
//! lookback predicate ever needs to look at — a monotonic-deque-style
//! bounded buffer per `DESIGN.md`'s "sorted data structures" note, rather
//! than rescanning the full bar history every time.

use std::collections::VecDeque;

use crate::domain::{IdGen, Leg, LegDirection, LegId, PendingOrigin, PendingOriginSource};

#[derive(Debug, Clone, Copy)]
struct WindowBar {
    index: u64,
    high: f64,
    low: f64,
}

/// A confirmed swing point (§4.3): the pivot-confirmation predicate passed
/// for this bar, `lookback` bars after it occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmedPivot {
    pub raw_high: bool,
    pub price: f64,
    pub bar_index: u64,
}

pub struct LegStore {
    pub active_legs: Vec<Leg>,
    window: VecDeque<WindowBar>,
    lookback: u32,
    last_index: Option<u64>,
    id_gen: IdGen,
    pending_low: Option<PendingOrigin>,
    pending_high: Option<PendingOrigin>,
    low_seeded_from_pivot: bool,
    high_seeded_from_pivot: bool,
}

impl LegStore {
    pub fn new(lookback: u32, id_gen: IdGen) -> Self {
        Self {
            active_legs: Vec::new(),
            window: VecDeque::with_capacity(2 * lookback as usize + 1),
            lookback,
            last_index: None,
            id_gen,
            pending_low: None,
            pending_high: None,
            low_seeded_from_pivot: false,
            high_seeded_from_pivot: false,
        }
    }

    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    /// Append one bar's high/low to the pivot-confirmation window and the
    /// rolling lookback-extreme fallback (§3 `PendingOrigin`). Returns the
    /// confirmed pivot at `index - lookback`, if the window is full and that
    /// bar qualifies (§4.3, §4.4 step 2).
    pub fn push_bar(&mut self, index: u64, high: f64, low: f64) -> Vec<ConfirmedPivot> {
        self.last_index = Some(index);
        self.window.push_back(WindowBar { index, high, low });
        let capacity = 2 * self.lookback as usize + 1;
        while self.window.len() > capacity {
            self.window.pop_front();
        }

        // Lookback-extreme fallback pending origins (§3, §4.3): while no real
        // pivot of that raw type has confirmed yet, the rolling extreme over
        // the trailing `lookback` bars stands in.
        let trail_start = self.window.len().saturating_sub(self.lookback as usize);
        if !self.low_seeded_from_pivot {
            if let Some(bar) = self.window.iter().skip(trail_start).min_by(|a, b| {
                a.low.partial_cmp(&b.low).unwrap()
            }) {
                self.pending_low = Some(PendingOrigin {
                    price: bar.low,
                    bar_index: bar.index,
                    direction: LegDirection::Bull,
                    source: PendingOriginSource::LookbackExtreme,
                });
            }
        }
        if !self.high_seeded_from_pivot {
            if let Some(bar) = self.window.iter().skip(trail_start).max_by(|a, b| {
                a.high.partial_cmp(&b.high).unwrap()
            }) {
                self.pending_high = Some(PendingOrigin {
                    price: bar.high,
                    bar_index: bar.index,
                    direction: LegDirection::Bear,
                    source: PendingOriginSource::LookbackExtreme,
                });
            }
        }

        if self.window.len() < capacity {
            return Vec::new();
        }

        let center = self.lookback as usize;
        let center_bar = self.window[center];
        let mut confirmed = Vec::new();

        if self.is_swing_high(center) {
            confirmed.push(ConfirmedPivot {
                raw_high: true,
                price: center_bar.high,
                bar_index: center_bar.index,
            });
            self.pending_high = Some(PendingOrigin {
                price: center_bar.high,
                bar_index: center_bar.index,
                direction: LegDirection::Bear,
                source: PendingOriginSource::PriorPivot,
            });
            self.high_seeded_from_pivot = true;
        }
        if self.is_swing_low(center) {
            confirmed.push(ConfirmedPivot {
                raw_high: false,
                price: center_bar.low,
                bar_index: center_bar.index,
            });
            self.pending_low = Some(PendingOrigin {
                price: center_bar.low,
                bar_index: center_bar.index,
                direction: LegDirection::Bull,
                source: PendingOriginSource::PriorPivot,
            });
            self.low_seeded_from_pivot = true;
        }
        confirmed
    }

    /// §4.3: bar at `center` has the strictly greatest high in the window,
    /// ties broken in favor of the earlier bar (first-wins): an equal high
    /// at an earlier index disqualifies the center bar, an equal high at a
    /// later index does not.
    fn is_swing_high(&self, center: usize) -> bool {
        let center_high = self.window[center].high;
        for (i, bar) in self.window.iter().enumerate() {
            if i == center {
                continue;
            }
            if i < center {
                if bar.high >= center_high {
                    return false;
                }
            } else if bar.high > center_high {
                return false;
            }
        }
        true
    }

    fn is_swing_low(&self, center: usize) -> bool {
        let center_low = self.window[center].low;
        for (i, bar) in self.window.iter().enumerate() {
            if i == center {
                continue;
            }
            if i < center {
                if bar.low <= center_low {
                    return false;
                }
            } else if bar.low < center_low {
                return false;
            }
        }
        true
    }

    /// §4.4 step 3: extend same-direction active legs toward a newly
    /// confirmed pivot. Returns the leg ids whose pivot actually moved.
    pub fn extend_active_legs(&mut self, pivot: ConfirmedPivot) -> Vec<LegId> {
        let direction = if pivot.raw_high {
            LegDirection::Bull
        } else {
            LegDirection::Bear
        };
        let mut extended = Vec::new();
        for leg in self.active_legs.iter_mut() {
            if leg.direction != direction || !leg.status.is_active() {
                continue;
            }
            if leg.try_extend_pivot(pivot.price, pivot.bar_index) {
                extended.push(leg.leg_id.clone());
            }
        }
        extended
    }

    /// §4.4 step 4: seed a new leg from `pivot` and the opposite-raw-type
    /// pending origin, if the temporal and range conditions hold. Returns
    /// the new leg's index in `active_legs` on success.
    pub fn try_seed_leg(&mut self, pivot: ConfirmedPivot, min_leg_range: f64) -> Option<usize> {
        let (origin, direction) = if pivot.raw_high {
            (self.pending_low?, LegDirection::Bull)
        } else {
            (self.pending_high?, LegDirection::Bear)
        };
        if origin.bar_index >= pivot.bar_index {
            return None;
        }
        let range = (pivot.price - origin.price).abs();
        if range < min_leg_range || range <= 0.0 {
            return None;
        }

        let (origin_price, origin_index, pivot_price, pivot_index) =
            (origin.price, origin.bar_index, pivot.price, pivot.bar_index);

        // Innermost active same-direction leg whose span brackets the new one.
        let parent = self
            .active_legs
            .iter()
            .filter(|l| l.direction == direction && l.status.is_active())
            .filter(|l| l.contains(origin_index, pivot_index))
            .min_by(|a, b| a.range.partial_cmp(&b.range).unwrap());
        let (parent_leg_id, depth) = match parent {
            Some(p) => (Some(p.leg_id.clone()), p.depth + 1),
            None => (None, 0),
        };

        let leg_id = self.id_gen.next_leg_id(direction, origin_index);
        let leg = Leg::new(
            leg_id,
            direction,
            origin_price,
            origin_index,
            pivot_price,
            pivot_index,
            depth,
            parent_leg_id,
        );
        self.active_legs.push(leg);
        Some(self.active_legs.len() - 1)
    }

    pub fn pending_low(&self) -> Option<PendingOrigin> {
        self.pending_low
    }

    pub fn pending_high(&self) -> Option<PendingOrigin> {
        self.pending_high
    }
}
