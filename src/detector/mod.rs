//! Incremental leg detector (§4.3, §4.4).

pub mod config;
pub mod leg_detector;
pub mod leg_store;

pub use config::DetectionConfig;
pub use leg_detector::LegDetector;
pub use leg_store::{ConfirmedPivot, LegStore};
