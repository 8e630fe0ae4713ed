//! Gamification state: achievements, streaks, goals, settings and points.

use crate::{
    default_achievements, default_streaks, evaluate_lapses, triggered_achievements, Achievement,
    NotificationSettings, NotificationSettingsPatch, Signal, Streak, StreakKind, WeeklyGoal,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// An achievement that just unlocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlock {
    pub id: String,
    pub title: String,
    pub description: String,
    pub points: u32,
}

/// Everything the gamification document holds.
///
/// Field names match the persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionState {
    #[serde(default = "default_achievements")]
    pub achievements: Vec<Achievement>,
    #[serde(default = "default_streaks")]
    pub streaks: Vec<Streak>,
    #[serde(default)]
    pub weekly_goals: Vec<WeeklyGoal>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
    #[serde(default)]
    pub total_points: u32,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            achievements: default_achievements(),
            streaks: default_streaks(),
            weekly_goals: Vec::new(),
            notification_settings: NotificationSettings::default(),
            total_points: 0,
        }
    }
}

impl ProgressionState {
    /// Add catalog entries and streak kinds missing from a stored state.
    /// Returns whether anything was added.
    pub fn ensure_catalog(&mut self) -> bool {
        let mut added = false;
        for achievement in default_achievements() {
            if !self.achievements.iter().any(|a| a.id == achievement.id) {
                self.achievements.push(achievement);
                added = true;
            }
        }
        for streak in default_streaks() {
            if !self.streaks.iter().any(|s| s.kind == streak.kind) {
                self.streaks.push(streak);
                added = true;
            }
        }
        added
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn streak(&self, kind: StreakKind) -> Option<&Streak> {
        self.streaks.iter().find(|s| s.kind == kind)
    }

    pub fn unlocked_achievements(&self) -> Vec<&Achievement> {
        self.achievements.iter().filter(|a| a.unlocked).collect()
    }

    pub fn longest_streak(&self) -> u32 {
        self.streaks.iter().map(|s| s.longest).max().unwrap_or(0)
    }

    /// Feed `observed` into one achievement. Unknown ids are ignored.
    pub fn check_achievement(
        &mut self,
        id: &str,
        observed: u32,
        now: DateTime<Utc>,
    ) -> Option<Unlock> {
        let slot = self.achievements.iter_mut().find(|a| a.id == id)?;
        let (next, points) = slot.check(observed, now);
        *slot = next;
        if points == 0 {
            return None;
        }

        self.total_points = self.total_points.saturating_add(points);
        info!(
            achievement = %slot.id,
            points,
            total_points = self.total_points,
            "Achievement unlocked"
        );
        Some(Unlock {
            id: slot.id.clone(),
            title: slot.title.clone(),
            description: slot.description.clone(),
            points,
        })
    }

    /// Feed a signal into every achievement it triggers.
    pub fn apply_signal(&mut self, signal: Signal, now: DateTime<Utc>) -> Vec<Unlock> {
        triggered_achievements(signal)
            .iter()
            .filter_map(|id| self.check_achievement(id, signal.value(), now))
            .collect()
    }

    /// Record a completed habit on `day` and feed the resulting streak value
    /// to the achievements that track it.
    pub fn record_completion(
        &mut self,
        kind: StreakKind,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<Unlock> {
        if self.streak(kind).is_none() {
            self.streaks.push(Streak::new(kind));
        }
        let Some(streak) = self.streaks.iter_mut().find(|s| s.kind == kind) else {
            return Vec::new();
        };
        *streak = streak.advance(day);
        let current = streak.current;
        debug!(streak = ?kind, current, day = %day, "Streak advanced");

        self.apply_signal(Signal::StreakValue(kind, current), now)
    }

    /// Reset lapsed streaks. Returns whether any streak changed.
    pub fn evaluate_lapses(&mut self, today: NaiveDate) -> bool {
        let (streaks, changed) = evaluate_lapses(&self.streaks, today);
        if changed {
            debug!(today = %today, "Lapsed streaks reset");
            self.streaks = streaks;
        }
        changed
    }

    /// Add a goal, replacing any goal with the same id.
    pub fn add_weekly_goal(&mut self, goal: WeeklyGoal) {
        match self.weekly_goals.iter_mut().find(|g| g.id == goal.id) {
            Some(existing) => *existing = goal,
            None => self.weekly_goals.push(goal),
        }
    }

    /// Set a goal's progress, clamped to its target. Returns `false` when
    /// no goal has that id.
    pub fn update_weekly_goal_progress(&mut self, goal_id: &str, progress: u32) -> bool {
        match self.weekly_goals.iter_mut().find(|g| g.id == goal_id) {
            Some(goal) => {
                *goal = goal.with_progress(progress);
                true
            }
            None => false,
        }
    }

    pub fn update_notification_settings(&mut self, patch: NotificationSettingsPatch) {
        self.notification_settings = self.notification_settings.apply(patch);
    }
}
