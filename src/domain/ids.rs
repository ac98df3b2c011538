//! Deterministic ID generation using BLAKE3.
//!
//! `LegId` mirrors the teacher's `hash_id!` pattern (BLAKE3 digest, hex
//! display, serde-as-hex) but is derived the way `rng::RngHierarchy` derives
//! sub-seeds: from the caller-supplied `SessionSeed` and the values that
//! identify *what* is being created, not from derivation order. This gives
//! testable property 9 (leg ids are deterministic functions of creation bar
//! and origin) for free — replaying the same bars against the same seed
//! reproduces the same ids, and a per-session monotone counter only
//! disambiguates ids that would otherwise collide (e.g. a leg recreated at
//! the same origin after a prune).

use serde::{Deserialize, Serialize};
use std::fmt;

use super::leg::LegDirection;

/// Per-session seed mixed into every `LegId` derivation.
///
/// Two sessions fed identical bars and configs produce identical leg ids iff
/// they share a `SessionSeed` — this is what "deterministic function of
/// creation bar and origin" means in a multi-session world (§5: sessions
/// never share mutable state, but two sessions replaying the same inputs
/// must be comparable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionSeed(pub u64);

impl Default for SessionSeed {
    fn default() -> Self {
        Self(0)
    }
}

/// Stable, BLAKE3-derived identifier for a `Leg`, unique within a session.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegId(String);

impl LegId {
    /// Derive a new leg id from the session seed, the leg's direction and
    /// origin, and a monotone per-session counter.
    fn derive(seed: SessionSeed, direction: LegDirection, origin_index: u64, counter: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&seed.0.to_le_bytes());
        hasher.update(&[direction as u8]);
        hasher.update(&origin_index.to_le_bytes());
        hasher.update(&counter.to_le_bytes());
        let hash = hasher.finalize();
        let hex: String = hash.as_bytes()[..8].iter().map(|b| format!("{b:02x}")).collect();
        let tag = match direction {
            LegDirection::Bull => "bull",
            LegDirection::Bear => "bear",
        };
        Self(format!("{tag}-{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LegId({})", self.0)
    }
}

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session, per-direction monotone counter feeding `LegId` derivation.
///
/// No globals (§9): every session owns its own `IdGen`, seeded explicitly at
/// `init` (§6.2).
#[derive(Debug, Clone)]
pub struct IdGen {
    seed: SessionSeed,
    next_bull: u64,
    next_bear: u64,
}

impl IdGen {
    pub fn new(seed: SessionSeed) -> Self {
        Self {
            seed,
            next_bull: 0,
            next_bear: 0,
        }
    }

    pub fn next_leg_id(&mut self, direction: LegDirection, origin_index: u64) -> LegId {
        let counter = match direction {
            LegDirection::Bull => {
                let c = self.next_bull;
                self.next_bull += 1;
                c
            }
            LegDirection::Bear => {
                let c = self.next_bear;
                self.next_bear += 1;
                c
            }
        };
        LegId::derive(self.seed, direction, origin_index, counter)
    }
}
