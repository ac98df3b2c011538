//! swingref-core — incremental reference-swing detection and Fibonacci-level
//! salience scoring over streaming OHLC bars.
//!
//! This crate contains:
//! - Domain types (bars, legs, ids, events)
//! - The Fibonacci reference frame (location mapping, capping, completion)
//! - The sliding-window decile classifier (`BinDistribution`)
//! - The incremental leg detector (pivot confirmation, extension, seeding,
//!   breach tracking, pruning)
//! - The reference layer (formation, fatal-breach filtering, salience
//!   scoring, secondary groupings)
//! - The level-crossing tracker and confluence-zone grouping
//! - The per-bar snapshot buffer
//! - `Session`, the `init`/`advance`/`reset`/query external interface

pub mod bin_distribution;
pub mod detector;
pub mod domain;
pub mod error;
pub mod reference;
pub mod reference_frame;
pub mod session;
pub mod snapshot;

pub use domain::{Bar, BarError, Event, Leg, LegDirection, LegId, LegStatus, LifecycleEvent, SessionSeed};
pub use error::SessionError;
pub use session::{AdvanceOutput, Lineage, Session};
