//! Gamification operations: streaks, achievements, goals and settings.

use crate::{EngineResult, WellnessEngine};
use chrono::NaiveDate;
use domain_sync::GamificationPatch;
use progression::{NotificationSettings, NotificationSettingsPatch, StreakKind, Unlock, WeeklyGoal};
use tracing::{debug, info};

impl WellnessEngine {
    /// Reset streaks that lapsed since they were last extended, and persist
    /// the reset. Call when the app comes to the foreground. Returns whether
    /// any streak changed.
    pub async fn on_foreground(&self) -> EngineResult<bool> {
        let user_id = self.user_id()?;
        let today = self.clock.today();

        let patch = {
            let mut state = self.state.lock();
            if !state.progression.evaluate_lapses(today) {
                return Ok(false);
            }
            GamificationPatch {
                streaks: Some(state.progression.streaks.clone()),
                ..GamificationPatch::default()
            }
        };

        info!(user_id = %user_id, today = %today, "Lapsed streaks reset");
        self.push_progression("on_foreground", &user_id, patch)
            .await?;
        Ok(true)
    }

    /// Record a completed habit on `day`.
    pub async fn record_completion(
        &self,
        kind: StreakKind,
        day: NaiveDate,
    ) -> EngineResult<Vec<Unlock>> {
        let user_id = self.user_id()?;
        let now = self.clock.now();

        let (patch, unlocks) = {
            let mut state = self.state.lock();
            let unlocks = state.progression.record_completion(kind, day, now);
            let patch = GamificationPatch {
                achievements: Some(state.progression.achievements.clone()),
                streaks: Some(state.progression.streaks.clone()),
                total_points: Some(state.progression.total_points),
                ..GamificationPatch::default()
            };
            (patch, unlocks)
        };

        self.push_progression("record_completion", &user_id, patch)
            .await?;
        Ok(unlocks)
    }

    /// Feed an observed value into one achievement. Unknown ids are ignored.
    pub async fn check_achievement(&self, id: &str, observed: u32) -> EngineResult<Option<Unlock>> {
        let user_id = self.user_id()?;
        let now = self.clock.now();

        let (patch, unlock) = {
            let mut state = self.state.lock();
            let before = state.progression.achievement(id).cloned();
            let unlock = state.progression.check_achievement(id, observed, now);
            if state.progression.achievement(id).cloned() == before {
                return Ok(None);
            }
            let patch = GamificationPatch {
                achievements: Some(state.progression.achievements.clone()),
                total_points: unlock.as_ref().map(|_| state.progression.total_points),
                ..GamificationPatch::default()
            };
            (patch, unlock)
        };

        self.push_progression("check_achievement", &user_id, patch)
            .await?;
        Ok(unlock)
    }

    /// Add a weekly goal, replacing any goal with the same id.
    pub async fn add_weekly_goal(&self, goal: WeeklyGoal) -> EngineResult<()> {
        let user_id = self.user_id()?;
        debug!(goal = %goal.id, "Adding weekly goal");
        let patch = {
            let mut state = self.state.lock();
            state.progression.add_weekly_goal(goal);
            goals_patch(&state.progression.weekly_goals)
        };
        self.push_progression("add_weekly_goal", &user_id, patch)
            .await
    }

    /// Set a goal's progress, clamped to its target. Returns `false` without
    /// writing when no goal has that id.
    pub async fn update_weekly_goal_progress(
        &self,
        goal_id: &str,
        progress: u32,
    ) -> EngineResult<bool> {
        let user_id = self.user_id()?;
        let patch = {
            let mut state = self.state.lock();
            if !state
                .progression
                .update_weekly_goal_progress(goal_id, progress)
            {
                return Ok(false);
            }
            goals_patch(&state.progression.weekly_goals)
        };
        self.push_progression("update_weekly_goal_progress", &user_id, patch)
            .await?;
        Ok(true)
    }

    pub async fn update_notification_settings(
        &self,
        patch: NotificationSettingsPatch,
    ) -> EngineResult<NotificationSettings> {
        let user_id = self.user_id()?;
        let settings = {
            let mut state = self.state.lock();
            state.progression.update_notification_settings(patch);
            state.progression.notification_settings.clone()
        };
        let patch = GamificationPatch {
            notification_settings: Some(settings.clone()),
            ..GamificationPatch::default()
        };
        self.push_progression("update_notification_settings", &user_id, patch)
            .await?;
        Ok(settings)
    }
}

fn goals_patch(goals: &[WeeklyGoal]) -> GamificationPatch {
    GamificationPatch {
        weekly_goals: Some(goals.to_vec()),
        ..GamificationPatch::default()
    }
}
