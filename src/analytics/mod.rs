//! Derived numbers: streaks, the daily productivity score, per-day rollups with weekly reports,
//! and points/achievements. Everything here is computed from the stored collections; only the
//! rollups and the [gamification::Profile] are persisted.

pub mod gamification;
pub mod report;
pub mod score;
pub mod store;
pub mod streak;
