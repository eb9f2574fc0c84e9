//! Engine statistics.
//!
//! Counts delivered and dropped key events and the commands the engine
//! produced, so degraded behavior (a saturated queue, a failing sink) is
//! observable without ever surfacing to the end user.

pub mod counters;

pub use counters::{EngineStats, PersistedStats, SharedEngineStats, StatsSnapshot};
