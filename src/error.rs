//! Session-level error taxonomy (§6.3, §7).
//!
//! One `thiserror` enum for every fallible public operation, mirroring
//! `trendlab-core::data::provider::DataError`'s shape (one variant per
//! failure domain, each carrying just the fields needed to explain itself).
//! No `anyhow` — this is library code (see `DESIGN.md`).

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// A bar's `index` was not exactly one more than the last processed
    /// index (§4.4 step 1, §6.2 `advance`). Fatal to the current call; the
    /// session remains in its pre-call state (§7).
    #[error("bar index gap: expected {expected}, got {actual}")]
    GapError { expected: u64, actual: u64 },

    /// A bar failed the OHLC shape check (§3, §6.2 `advance`).
    #[error("bar {index} violates OHLC shape: {source}")]
    ShapeError {
        index: u64,
        #[source]
        source: crate::domain::BarError,
    },

    /// An operation was attempted on a session that has not been
    /// initialized (§6.2).
    #[error("session is not initialized")]
    NotInitialized,

    /// `get_reference_state` was asked for a bar index beyond the current
    /// position, or one with no retained snapshot (§6.2).
    #[error("bar index {requested} is out of range (current position is {current})")]
    IndexOutOfRange { requested: u64, current: u64 },

    /// `track` was called with 10 legs already tracked (§6.2, §7).
    #[error("tracking cap of {cap} legs already reached")]
    TrackingCapExceeded { cap: usize },

    /// A config update was rejected; the old config remains in effect (§7).
    #[error("invalid config: {reason}")]
    ConfigInvalid { reason: String },

    /// `get_lineage`, `track`, or `untrack` referenced a leg id the detector
    /// has never created (§6.2).
    #[error("no such leg: {leg_id}")]
    LegNotFound { leg_id: String },

    /// An internal invariant was violated — programmer error, not a
    /// consumer mistake. The session is marked unusable (§7).
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
