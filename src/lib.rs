//! Offline-first productivity data layer: tasks, habits, notes and projects kept in a local
//! cache, a queue that records mutations while offline and replays them once connectivity
//! returns, recurring task generation, and streak/score analytics.
//!

pub mod analytics;
pub mod cli;
pub mod error;
pub mod fs;
pub mod recurrence;
pub mod storage;
pub mod sync;
pub mod utils;
pub mod workspace;
