//! # Progression
//!
//! Pure state machines for habit streaks and achievements, plus the
//! gamification state they live in.
//!
//! Nothing here performs I/O or fails. Callers apply a transition to the
//! latest in-memory value synchronously and only then hand the result to
//! the sync layer, so two rapid calls never both start from the same stale
//! value.
//!
//! - [`Streak::advance`] moves a streak forward for a completed day.
//! - [`Streak::check_lapse`] discovers missed days lazily.
//! - [`Achievement::check`] clamps progress, latches unlocks and reports
//!   the points earned.
//! - [`ProgressionState`] ties them together with the default catalog.

mod achievement;
mod catalog;
mod goals;
mod settings;
mod state;
mod streak;

pub use achievement::{Achievement, AchievementKind, Rarity};
pub use catalog::{default_achievements, default_streaks, triggered_achievements, Signal};
pub use goals::{GoalKind, GoalPeriod, WeeklyGoal};
pub use settings::{NotificationSettings, NotificationSettingsPatch};
pub use state::{ProgressionState, Unlock};
pub use streak::{evaluate_lapses, Streak, StreakKind};
