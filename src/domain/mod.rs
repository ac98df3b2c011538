//! Domain types — bars, legs, ids, and events.

pub mod bar;
pub mod event;
pub mod ids;
pub mod leg;

pub use bar::{Bar, BarError};
pub use event::{CrossDirection, Event, LevelCrossEvent, LifecycleEvent};
pub use ids::{IdGen, LegId, SessionSeed};
pub use leg::{Leg, LegDirection, LegStatus, PendingOrigin, PendingOriginSource, PruneReason};
