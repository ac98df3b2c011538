//! Bar — the fundamental input unit, one OHLC candle at the source's native resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLC bar from the upstream bar source.
///
/// Immutable once constructed. `index` is the bar's 0-based position in the
/// source stream and must increase by exactly one between consecutive bars
/// fed to a session (§4.4 step 1); `timestamp` must be non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub index: u64,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Why a `Bar` failed the OHLC shape check (§6.2 `ShapeError`).
#[derive(Debug, Error, PartialEq)]
pub enum BarError {
    #[error("bar {index} has a non-finite price field")]
    NonFinite { index: u64 },
    #[error("bar {index} violates low <= open,close <= high (low={low}, open={open}, close={close}, high={high})")]
    InvalidShape {
        index: u64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

impl Bar {
    /// Validate the OHLC invariants from §3: all fields finite, `low <=
    /// open,close <= high`, `low <= high`.
    pub fn validate(&self) -> Result<(), BarError> {
        if !self.open.is_finite()
            || !self.high.is_finite()
            || !self.low.is_finite()
            || !self.close.is_finite()
        {
            return Err(BarError::NonFinite { index: self.index });
        }
        let sane = self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.low <= self.high;
        if !sane {
            return Err(BarError::InvalidShape {
                index: self.index,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}
