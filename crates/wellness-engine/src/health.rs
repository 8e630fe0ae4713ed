//! Health operations: metrics, plans, logs, check-ins and reflections.

use crate::{EngineResult, WellnessEngine};
use chrono::{DateTime, NaiveDate, Utc};
use domain_sync::{
    DomainUpdate, ExerciseLog, GamificationPatch, HealthMetrics, MealLog, MealPlan,
    MentalWellnessPlan, ReflectionEntry, ShoppingItem, UserProfile, WellnessCheckIn, WorkoutPlan,
};
use progression::{ProgressionState, Signal, StreakKind, Unlock};
use quota_gate::QuotaMetric;
use std::future::Future;
use tracing::debug;

/// Achievements, streaks and points, the fields a logged activity can move.
fn activity_patch(progression: &ProgressionState) -> GamificationPatch {
    GamificationPatch {
        achievements: Some(progression.achievements.clone()),
        streaks: Some(progression.streaks.clone()),
        total_points: Some(progression.total_points),
        ..GamificationPatch::default()
    }
}

fn reflection_time(entry: &ReflectionEntry) -> Option<DateTime<Utc>> {
    let raw = entry.get("date")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map(|at| at.and_utc())
        })
}

impl WellnessEngine {
    /// Replace today's metrics and record them in the history.
    pub async fn update_metrics(&self, metrics: HealthMetrics) -> EngineResult<Vec<Unlock>> {
        self.record_metrics("update_metrics", |_| metrics).await
    }

    /// Add `litres` to today's water intake.
    pub async fn log_water_intake(&self, litres: f64) -> EngineResult<Vec<Unlock>> {
        self.record_metrics("log_water_intake", |current| {
            let mut metrics = current.clone();
            let water = metrics.water.unwrap_or(0.0) + litres;
            metrics.water = Some((water * 100.0).round() / 100.0);
            metrics
        })
        .await
    }

    async fn record_metrics(
        &self,
        context: &'static str,
        next: impl FnOnce(&HealthMetrics) -> HealthMetrics,
    ) -> EngineResult<Vec<Unlock>> {
        let user_id = self.user_id()?;
        let today = self.clock.today();
        let now = self.clock.now();

        let (updates, patch, unlocks) = {
            let mut state = self.state.lock();
            let metrics = next(&state.health.health_metrics);
            state.health.health_metrics = metrics.clone();
            state.health.record_history(today, metrics.clone());

            let before = state.progression.achievements.clone();
            let unlocks = if metrics.steps > 0 {
                state
                    .progression
                    .apply_signal(Signal::Steps(metrics.steps), now)
            } else {
                Vec::new()
            };
            let patch = if state.progression.achievements != before {
                GamificationPatch {
                    achievements: Some(state.progression.achievements.clone()),
                    total_points: Some(state.progression.total_points),
                    ..GamificationPatch::default()
                }
            } else {
                GamificationPatch::default()
            };

            let updates = vec![
                DomainUpdate::HealthMetrics(metrics),
                DomainUpdate::HealthHistory(state.health.health_history.clone()),
            ];
            (updates, patch, unlocks)
        };

        self.push_progression_in_background(context, &user_id, patch);
        self.push(context, &user_id, updates).await?;
        Ok(unlocks)
    }

    pub async fn add_workout_plan(&self, plan: WorkoutPlan) -> EngineResult<()> {
        let user_id = self.user_id()?;
        let user = user_id.as_str();
        self.guarded(user, QuotaMetric::WorkoutPlans, move || async move {
            let update = {
                let mut state = self.state.lock();
                state.health.workout_plans.push(plan);
                DomainUpdate::WorkoutPlans(state.health.workout_plans.clone())
            };
            self.push("add_workout_plan", user, vec![update]).await
        })
        .await
    }

    pub async fn add_meal_plan(&self, plan: MealPlan) -> EngineResult<()> {
        let user_id = self.user_id()?;
        let user = user_id.as_str();
        self.guarded(user, QuotaMetric::MealPlans, move || async move {
            let update = {
                let mut state = self.state.lock();
                state.health.meal_plans.push(plan);
                DomainUpdate::MealPlans(state.health.meal_plans.clone())
            };
            self.push("add_meal_plan", user, vec![update]).await
        })
        .await
    }

    /// Record a check-in. Its mood, stress and energy become today's
    /// metrics, and the check-in streak advances.
    pub async fn add_wellness_check_in(
        &self,
        check_in: WellnessCheckIn,
    ) -> EngineResult<Vec<Unlock>> {
        let user_id = self.user_id()?;
        let user = user_id.as_str();
        self.guarded(user, QuotaMetric::WellnessCheckIns, move || async move {
            let today = self.clock.today();
            let now = self.clock.now();

            let (updates, patch, unlocks) = {
                let mut state = self.state.lock();
                let mut metrics = state.health.health_metrics.clone();
                metrics.mood = Some(check_in.mood);
                metrics.stress = Some(check_in.stress_level);
                metrics.energy = Some(check_in.energy_level);

                state.health.wellness_check_ins.push(check_in);
                state.health.health_metrics = metrics.clone();
                state.health.record_history(today, metrics.clone());

                let count = state.health.wellness_check_ins.len() as u32;
                let mut unlocks =
                    state
                        .progression
                        .record_completion(StreakKind::CheckIn, today, now);
                unlocks.extend(
                    state
                        .progression
                        .apply_signal(Signal::CheckInsLogged(count), now),
                );

                let updates = vec![
                    DomainUpdate::WellnessCheckIns(state.health.wellness_check_ins.clone()),
                    DomainUpdate::HealthMetrics(metrics),
                    DomainUpdate::HealthHistory(state.health.health_history.clone()),
                ];
                (updates, activity_patch(&state.progression), unlocks)
            };

            self.push_progression_in_background("add_wellness_check_in", user, patch);
            self.push("add_wellness_check_in", user, updates).await?;
            Ok(unlocks)
        })
        .await
    }

    /// Record a workout. The workout streak advances for today.
    pub async fn add_exercise_log(&self, log: ExerciseLog) -> EngineResult<Vec<Unlock>> {
        let user_id = self.user_id()?;
        let user = user_id.as_str();
        self.guarded(user, QuotaMetric::ExerciseLogs, move || async move {
            let today = self.clock.today();
            let now = self.clock.now();

            let (update, patch, unlocks) = {
                let mut state = self.state.lock();
                state.health.exercise_logs.push(log);
                let count = state.health.exercise_logs.len() as u32;

                let mut unlocks =
                    state
                        .progression
                        .record_completion(StreakKind::Workout, today, now);
                unlocks.extend(
                    state
                        .progression
                        .apply_signal(Signal::WorkoutsLogged(count), now),
                );

                let update = DomainUpdate::ExerciseLogs(state.health.exercise_logs.clone());
                (update, activity_patch(&state.progression), unlocks)
            };

            self.push_progression_in_background("add_exercise_log", user, patch);
            self.push("add_exercise_log", user, vec![update]).await?;
            Ok(unlocks)
        })
        .await
    }

    pub async fn add_meal_log(&self, log: MealLog) -> EngineResult<Vec<Unlock>> {
        let user_id = self.user_id()?;
        let user = user_id.as_str();
        self.guarded(user, QuotaMetric::MealLogs, move || async move {
            let now = self.clock.now();

            let (update, patch, unlocks) = {
                let mut state = self.state.lock();
                state.health.meal_logs.push(log);
                let count = state.health.meal_logs.len() as u32;
                let unlocks = state
                    .progression
                    .apply_signal(Signal::MealsLogged(count), now);

                let update = DomainUpdate::MealLogs(state.health.meal_logs.clone());
                (update, activity_patch(&state.progression), unlocks)
            };

            self.push_progression_in_background("add_meal_log", user, patch);
            self.push("add_meal_log", user, vec![update]).await?;
            Ok(unlocks)
        })
        .await
    }

    /// Count one coach message against the daily quota. `send` runs only
    /// when the quota allows it, and is counted only if it succeeds.
    pub async fn record_coach_message<T, F, Fut>(&self, send: F) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let user_id = self.user_id()?;
        self.guarded(&user_id, QuotaMetric::AiCoachMessages, send)
            .await
    }

    pub async fn add_mental_wellness_plan(&self, plan: MentalWellnessPlan) -> EngineResult<()> {
        let user_id = self.user_id()?;
        let update = {
            let mut state = self.state.lock();
            state.health.mental_wellness_plans.push(plan);
            DomainUpdate::MentalWellnessPlans(state.health.mental_wellness_plans.clone())
        };
        self.push("add_mental_wellness_plan", &user_id, vec![update])
            .await
    }

    /// Add a reflection, keeping entries ordered by their `date`.
    pub async fn add_reflection(&self, entry: ReflectionEntry) -> EngineResult<()> {
        let user_id = self.user_id()?;
        let update = {
            let mut state = self.state.lock();
            state.health.reflections.push(entry);
            state.health.reflections.sort_by_key(reflection_time);
            DomainUpdate::Reflections(state.health.reflections.clone())
        };
        self.push("add_reflection", &user_id, vec![update]).await
    }

    pub async fn update_shopping_list(&self, items: Vec<ShoppingItem>) -> EngineResult<()> {
        let user_id = self.user_id()?;
        debug!(items = items.len(), "Shopping list updated");
        self.state.lock().health.shopping_list = items.clone();
        self.push(
            "update_shopping_list",
            &user_id,
            vec![DomainUpdate::ShoppingList(items)],
        )
        .await
    }

    pub async fn save_profile(&self, profile: UserProfile) -> EngineResult<()> {
        let user_id = self.user_id()?;
        self.state.lock().health.user_profile = Some(profile.clone());
        self.push(
            "save_profile",
            &user_id,
            vec![DomainUpdate::UserProfile(profile)],
        )
        .await
    }

    pub async fn complete_onboarding(&self, profile: UserProfile) -> EngineResult<()> {
        let user_id = self.user_id()?;
        {
            let mut state = self.state.lock();
            state.health.user_profile = Some(profile.clone());
            state.health.onboarding_complete = true;
        }
        self.push(
            "complete_onboarding",
            &user_id,
            vec![
                DomainUpdate::UserProfile(profile),
                DomainUpdate::Onboarding { complete: true },
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{signed_in, Harness};
    use crate::EngineError;
    use domain_sync::{MealType, MoodLevel};
    use quota_gate::{Plan, QuotaLimit};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn exercise(id: &str) -> ExerciseLog {
        ExerciseLog {
            id: id.to_string(),
            date: "2024-01-05T07:30:00.000Z".to_string(),
            kind: "run".to_string(),
            duration: 30,
            calories: Some(280.0),
            intensity: None,
            notes: None,
        }
    }

    fn check_in(id: &str) -> WellnessCheckIn {
        WellnessCheckIn {
            id: id.to_string(),
            date: "2024-01-05T20:00:00.000Z".to_string(),
            mood: MoodLevel::Good,
            stress_level: 3,
            energy_level: 7,
            sleep_quality: 8,
            notes: None,
        }
    }

    fn quota_count(h: &Harness, field: &str) -> u64 {
        h.store.document("quotaUsage", "u1").unwrap()[field]
            .as_u64()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn exercise_logs_are_metered_and_advance_the_streak() {
        let h = signed_in().await;

        let unlocks = h.engine.add_exercise_log(exercise("e1")).await.unwrap();
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].id, "first_workout");

        for i in 2..=5 {
            let unlocks = h
                .engine
                .add_exercise_log(exercise(&format!("e{i}")))
                .await
                .unwrap();
            assert!(unlocks.is_empty());
        }
        assert_eq!(quota_count(&h, "exerciseLogsToday"), 5);

        // Free plan allows five per day.
        let denied = h.engine.add_exercise_log(exercise("e6")).await;
        assert!(matches!(
            denied,
            Err(EngineError::QuotaExceeded {
                limit: QuotaLimit::Limited(5),
                metric: QuotaMetric::ExerciseLogs
            })
        ));
        assert_eq!(h.engine.health().exercise_logs.len(), 5);
        assert_eq!(quota_count(&h, "exerciseLogsToday"), 5);

        let streak = h.engine.progression().streak(StreakKind::Workout).cloned().unwrap();
        assert_eq!(streak.current, 1);
        assert_eq!(h.engine.total_points(), 10);

        let stored = h.store.document("exerciseLogs", "u1").unwrap();
        assert_eq!(stored["logs"].as_array().unwrap().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn upgraded_plan_lifts_the_limit() {
        let h = signed_in().await;
        h.engine.add_wellness_check_in(check_in("c1")).await.unwrap();
        assert!(h
            .engine
            .add_wellness_check_in(check_in("c2"))
            .await
            .unwrap_err()
            .is_quota_denial());

        h.engine.set_plan(Plan::Basic);
        h.engine.add_wellness_check_in(check_in("c2")).await.unwrap();
        assert_eq!(h.engine.health().wellness_check_ins.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn check_in_updates_metrics_and_streak() {
        let h = signed_in().await;
        h.engine.add_wellness_check_in(check_in("c1")).await.unwrap();

        let health = h.engine.health();
        assert_eq!(health.health_metrics.mood, Some(MoodLevel::Good));
        assert_eq!(health.health_metrics.stress, Some(3));
        assert_eq!(health.health_metrics.energy, Some(7));
        assert_eq!(health.health_history.len(), 1);

        let streak = h.engine.progression().streak(StreakKind::CheckIn).cloned().unwrap();
        assert_eq!(streak.current, 1);
        assert_eq!(quota_count(&h, "wellnessCheckInsToday"), 1);

        let stored = h.store.document("healthMetrics", "u1").unwrap();
        assert_eq!(stored["mood"], json!("good"));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_metric_updates_coalesce_into_one_write() {
        let h = signed_in().await;
        let before = h.store.writes_to("healthMetrics", "u1").len();

        let steps = |steps| HealthMetrics {
            steps,
            ..HealthMetrics::default()
        };
        let (a, b, c) = tokio::join!(
            h.engine.update_metrics(steps(100)),
            h.engine.update_metrics(steps(200)),
            h.engine.update_metrics(steps(1500)),
        );
        a.unwrap();
        b.unwrap();
        let unlocks = c.unwrap();
        assert_eq!(unlocks.len(), 1);
        assert_eq!(unlocks[0].id, "first_step");

        let writes = h.store.writes_to("healthMetrics", "u1");
        assert_eq!(writes.len(), before + 1);
        assert_eq!(writes.last().unwrap().data["steps"], json!(1500));
        // One history entry per day.
        assert_eq!(h.engine.health().health_history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn water_intake_accumulates() {
        let h = signed_in().await;
        h.engine.log_water_intake(0.25).await.unwrap();
        h.engine.log_water_intake(0.1).await.unwrap();

        assert_eq!(h.engine.health().health_metrics.water, Some(0.35));
        let stored = h.store.document("healthMetrics", "u1").unwrap();
        assert_eq!(stored["water"], json!(0.35));
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_metric_stays_cleared_after_refresh() {
        let h = signed_in().await;
        h.engine
            .update_metrics(HealthMetrics {
                steps: 100,
                water: Some(2.0),
                ..HealthMetrics::default()
            })
            .await
            .unwrap();
        h.engine
            .update_metrics(HealthMetrics {
                steps: 200,
                water: None,
                ..HealthMetrics::default()
            })
            .await
            .unwrap();

        let stored = h.store.document("healthMetrics", "u1").unwrap();
        assert!(stored.get("water").is_none());

        h.engine.refresh().await.unwrap();
        let metrics = h.engine.health().health_metrics;
        assert_eq!(metrics.steps, 200);
        assert_eq!(metrics.water, None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_check_ins_respect_the_limit() {
        let h = signed_in().await;

        // Free plan allows one check-in per day.
        let (a, b) = tokio::join!(
            h.engine.add_wellness_check_in(check_in("c1")),
            h.engine.add_wellness_check_in(check_in("c2")),
        );

        assert!(a.is_ok());
        assert!(matches!(
            b,
            Err(EngineError::QuotaExceeded {
                limit: QuotaLimit::Limited(1),
                metric: QuotaMetric::WellnessCheckIns
            })
        ));
        assert_eq!(h.engine.health().wellness_check_ins.len(), 1);
        assert_eq!(quota_count(&h, "wellnessCheckInsToday"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn meal_logs_feed_meal_achievements() {
        let h = signed_in().await;
        h.engine.set_plan(Plan::Pro);

        let mut unlocked = Vec::new();
        for i in 0..10 {
            let log = MealLog {
                id: format!("m{i}"),
                date: "2024-01-05T12:00:00.000Z".to_string(),
                meal_type: MealType::Lunch,
                name: "Salad".to_string(),
                calories: Some(350.0),
                protein: None,
                carbs: None,
                fats: None,
                notes: None,
            };
            unlocked.extend(h.engine.add_meal_log(log).await.unwrap());
        }

        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "meal_tracker");
        let progress = h.engine.progression();
        assert_eq!(progress.achievement("nutrition_master").unwrap().progress, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn coach_messages_stop_at_the_daily_limit() {
        let h = signed_in().await;
        let sent = AtomicUsize::new(0);
        let sent_ref = &sent;

        for _ in 0..5 {
            h.engine
                .record_coach_message(move || async move {
                    sent_ref.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }
        let denied = h
            .engine
            .record_coach_message(move || async move {
                sent_ref.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(denied, Err(EngineError::QuotaExceeded { .. })));
        assert_eq!(sent.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_is_not_counted() {
        let h = signed_in().await;
        let result: EngineResult<()> = h
            .engine
            .record_coach_message(|| async { Err(EngineError::NotSignedIn) })
            .await;
        assert!(matches!(result, Err(EngineError::NotSignedIn)));
        assert_eq!(quota_count(&h, "aiCoachMessagesToday"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reflections_are_kept_in_date_order() {
        let h = signed_in().await;
        for date in ["2024-01-04T09:00:00Z", "2024-01-02T09:00:00Z", "2024-01-03"] {
            h.engine
                .add_reflection(json!({"date": date, "prompt": "gratitude"}))
                .await
                .unwrap();
        }

        let dates: Vec<_> = h
            .engine
            .health()
            .reflections
            .iter()
            .map(|entry| entry["date"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            dates,
            vec!["2024-01-02T09:00:00Z", "2024-01-03", "2024-01-04T09:00:00Z"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn onboarding_writes_profile_and_flag() {
        let h = signed_in().await;
        h.engine
            .complete_onboarding(json!({"name": "Sam", "goal": "sleep"}))
            .await
            .unwrap();

        assert!(h.engine.health().onboarding_complete);
        assert_eq!(
            h.store.document("onboarding", "u1").unwrap()["complete"],
            json!(true)
        );
        assert_eq!(
            h.store.document("userProfiles", "u1").unwrap()["name"],
            json!("Sam")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn plans_sync_as_wrapped_lists() {
        let h = signed_in().await;
        h.engine.add_workout_plan(json!({"id": "w1"})).await.unwrap();
        h.engine
            .add_mental_wellness_plan(json!({"id": "mw1"}))
            .await
            .unwrap();

        let stored = h.store.document("workoutPlans", "u1").unwrap();
        assert_eq!(stored["plans"], json!([{"id": "w1"}]));
        let stored = h.store.document("mentalWellnessPlans", "u1").unwrap();
        assert_eq!(stored["plans"], json!([{"id": "mw1"}]));
        assert_eq!(quota_count(&h, "workoutPlansThisMonth"), 1);
    }
}
