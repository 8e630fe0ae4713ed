//! Typed domain updates and their document encoding.

use crate::types::*;
use crate::{Domain, DomainError, DomainResult};
use progression::{Achievement, NotificationSettings, ProgressionState, Streak, WeeklyGoal};
use remote_store::{Document, UPDATED_AT_FIELD};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// New content for one domain document.
///
/// Adding a domain means adding a variant here; every match over it is
/// exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainUpdate {
    UserProfile(UserProfile),
    HealthMetrics(HealthMetrics),
    WorkoutPlans(Vec<WorkoutPlan>),
    MealPlans(Vec<MealPlan>),
    WellnessCheckIns(Vec<WellnessCheckIn>),
    MentalWellnessPlans(Vec<MentalWellnessPlan>),
    HealthHistory(Vec<HealthHistoryEntry>),
    ExerciseLogs(Vec<ExerciseLog>),
    MealLogs(Vec<MealLog>),
    Reflections(Vec<ReflectionEntry>),
    ShoppingList(Vec<ShoppingItem>),
    Onboarding { complete: bool },
    Gamification(GamificationPatch),
    QuotaUsage(Document),
}

impl DomainUpdate {
    pub fn domain(&self) -> Domain {
        match self {
            DomainUpdate::UserProfile(_) => Domain::UserProfiles,
            DomainUpdate::HealthMetrics(_) => Domain::HealthMetrics,
            DomainUpdate::WorkoutPlans(_) => Domain::WorkoutPlans,
            DomainUpdate::MealPlans(_) => Domain::MealPlans,
            DomainUpdate::WellnessCheckIns(_) => Domain::WellnessCheckIns,
            DomainUpdate::MentalWellnessPlans(_) => Domain::MentalWellnessPlans,
            DomainUpdate::HealthHistory(_) => Domain::HealthHistory,
            DomainUpdate::ExerciseLogs(_) => Domain::ExerciseLogs,
            DomainUpdate::MealLogs(_) => Domain::MealLogs,
            DomainUpdate::Reflections(_) => Domain::Reflections,
            DomainUpdate::ShoppingList(_) => Domain::ShoppingList,
            DomainUpdate::Onboarding { .. } => Domain::Onboarding,
            DomainUpdate::Gamification(_) => Domain::Gamification,
            DomainUpdate::QuotaUsage(_) => Domain::QuotaUsage,
        }
    }

    /// Encode as the stored document (without `updatedAt`).
    pub fn to_document(&self) -> DomainResult<Document> {
        let domain = self.domain();
        match self {
            DomainUpdate::UserProfile(profile) => object(domain, profile.clone()),
            DomainUpdate::HealthMetrics(metrics) => object(domain, serde_json::to_value(metrics)?),
            DomainUpdate::WorkoutPlans(items)
            | DomainUpdate::MealPlans(items)
            | DomainUpdate::MentalWellnessPlans(items)
            | DomainUpdate::Reflections(items)
            | DomainUpdate::ShoppingList(items) => wrap(domain, items),
            DomainUpdate::WellnessCheckIns(items) => wrap(domain, items),
            DomainUpdate::HealthHistory(items) => wrap(domain, items),
            DomainUpdate::ExerciseLogs(items) => wrap(domain, items),
            DomainUpdate::MealLogs(items) => wrap(domain, items),
            DomainUpdate::Onboarding { complete } => {
                let mut doc = Document::new();
                doc.insert("complete".into(), Value::Bool(*complete));
                Ok(doc)
            }
            DomainUpdate::Gamification(patch) => object(domain, serde_json::to_value(patch)?),
            DomainUpdate::QuotaUsage(doc) => Ok(doc.clone()),
        }
    }

    /// Decode a stored document. `updatedAt` is dropped; a missing list
    /// field reads as an empty list.
    pub fn from_document(domain: Domain, mut doc: Document) -> DomainResult<DomainUpdate> {
        doc.remove(UPDATED_AT_FIELD);
        Ok(match domain {
            Domain::UserProfiles => DomainUpdate::UserProfile(Value::Object(doc)),
            Domain::HealthMetrics => DomainUpdate::HealthMetrics(decode(domain, Value::Object(doc))?),
            Domain::WorkoutPlans => DomainUpdate::WorkoutPlans(unwrap(domain, doc)?),
            Domain::MealPlans => DomainUpdate::MealPlans(unwrap(domain, doc)?),
            Domain::WellnessCheckIns => DomainUpdate::WellnessCheckIns(unwrap(domain, doc)?),
            Domain::MentalWellnessPlans => DomainUpdate::MentalWellnessPlans(unwrap(domain, doc)?),
            Domain::HealthHistory => DomainUpdate::HealthHistory(unwrap(domain, doc)?),
            Domain::ExerciseLogs => DomainUpdate::ExerciseLogs(unwrap(domain, doc)?),
            Domain::MealLogs => DomainUpdate::MealLogs(unwrap(domain, doc)?),
            Domain::Reflections => DomainUpdate::Reflections(unwrap(domain, doc)?),
            Domain::ShoppingList => DomainUpdate::ShoppingList(unwrap(domain, doc)?),
            Domain::Onboarding => DomainUpdate::Onboarding {
                complete: doc.get("complete").and_then(Value::as_bool).unwrap_or(false),
            },
            Domain::Gamification => DomainUpdate::Gamification(decode(domain, Value::Object(doc))?),
            Domain::QuotaUsage => DomainUpdate::QuotaUsage(doc),
        })
    }
}

fn object(domain: Domain, value: Value) -> DomainResult<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(DomainError::Malformed {
            domain,
            reason: format!("expected an object, got {other}"),
        }),
    }
}

fn list_field(domain: Domain) -> DomainResult<&'static str> {
    domain.list_field().ok_or_else(|| DomainError::Malformed {
        domain,
        reason: "not a list domain".to_string(),
    })
}

fn wrap<T: Serialize>(domain: Domain, items: &[T]) -> DomainResult<Document> {
    let mut doc = Document::new();
    doc.insert(list_field(domain)?.to_string(), serde_json::to_value(items)?);
    Ok(doc)
}

fn unwrap<T: DeserializeOwned>(domain: Domain, mut doc: Document) -> DomainResult<Vec<T>> {
    match doc.remove(list_field(domain)?) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => decode(domain, items),
    }
}

fn decode<T: DeserializeOwned>(domain: Domain, value: Value) -> DomainResult<T> {
    serde_json::from_value(value).map_err(|err| DomainError::Malformed {
        domain,
        reason: err.to_string(),
    })
}

/// Field-level update of the gamification document. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<Achievement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaks: Option<Vec<Streak>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_goals: Option<Vec<WeeklyGoal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_settings: Option<NotificationSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
}

impl GamificationPatch {
    /// A patch carrying every field of `state`.
    pub fn full(state: &ProgressionState) -> Self {
        Self {
            achievements: Some(state.achievements.clone()),
            streaks: Some(state.streaks.clone()),
            weekly_goals: Some(state.weekly_goals.clone()),
            notification_settings: Some(state.notification_settings.clone()),
            total_points: Some(state.total_points),
        }
    }

    /// Combine with a later patch; fields set in `newer` win.
    pub fn merge(self, newer: GamificationPatch) -> GamificationPatch {
        GamificationPatch {
            achievements: newer.achievements.or(self.achievements),
            streaks: newer.streaks.or(self.streaks),
            weekly_goals: newer.weekly_goals.or(self.weekly_goals),
            notification_settings: newer.notification_settings.or(self.notification_settings),
            total_points: newer.total_points.or(self.total_points),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == GamificationPatch::default()
    }

    pub fn apply_to(self, state: &mut ProgressionState) {
        if let Some(achievements) = self.achievements {
            state.achievements = achievements;
        }
        if let Some(streaks) = self.streaks {
            state.streaks = streaks;
        }
        if let Some(goals) = self.weekly_goals {
            state.weekly_goals = goals;
        }
        if let Some(settings) = self.notification_settings {
            state.notification_settings = settings;
        }
        if let Some(points) = self.total_points {
            state.total_points = points;
        }
    }
}

/// All health domains of one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthSnapshot {
    pub user_profile: Option<UserProfile>,
    pub health_metrics: HealthMetrics,
    pub workout_plans: Vec<WorkoutPlan>,
    pub meal_plans: Vec<MealPlan>,
    pub wellness_check_ins: Vec<WellnessCheckIn>,
    pub mental_wellness_plans: Vec<MentalWellnessPlan>,
    pub health_history: Vec<HealthHistoryEntry>,
    pub exercise_logs: Vec<ExerciseLog>,
    pub meal_logs: Vec<MealLog>,
    pub reflections: Vec<ReflectionEntry>,
    pub shopping_list: Vec<ShoppingItem>,
    pub onboarding_complete: bool,
}

impl HealthSnapshot {
    /// One update per health domain, as used by a full sync. The profile is
    /// skipped when absent.
    pub fn updates(&self) -> Vec<DomainUpdate> {
        let mut updates = Vec::with_capacity(Domain::HEALTH.len());
        if let Some(profile) = &self.user_profile {
            updates.push(DomainUpdate::UserProfile(profile.clone()));
        }
        updates.extend([
            DomainUpdate::HealthMetrics(self.health_metrics.clone()),
            DomainUpdate::WorkoutPlans(self.workout_plans.clone()),
            DomainUpdate::MealPlans(self.meal_plans.clone()),
            DomainUpdate::WellnessCheckIns(self.wellness_check_ins.clone()),
            DomainUpdate::MentalWellnessPlans(self.mental_wellness_plans.clone()),
            DomainUpdate::HealthHistory(self.health_history.clone()),
            DomainUpdate::ExerciseLogs(self.exercise_logs.clone()),
            DomainUpdate::MealLogs(self.meal_logs.clone()),
            DomainUpdate::Reflections(self.reflections.clone()),
            DomainUpdate::ShoppingList(self.shopping_list.clone()),
            DomainUpdate::Onboarding {
                complete: self.onboarding_complete,
            },
        ]);
        updates
    }

    /// Replace one domain's content. Returns `false` for updates that are
    /// not part of the snapshot.
    pub fn apply(&mut self, update: DomainUpdate) -> bool {
        match update {
            DomainUpdate::UserProfile(profile) => self.user_profile = Some(profile),
            DomainUpdate::HealthMetrics(metrics) => self.health_metrics = metrics,
            DomainUpdate::WorkoutPlans(items) => self.workout_plans = items,
            DomainUpdate::MealPlans(items) => self.meal_plans = items,
            DomainUpdate::WellnessCheckIns(items) => self.wellness_check_ins = items,
            DomainUpdate::MentalWellnessPlans(items) => self.mental_wellness_plans = items,
            DomainUpdate::HealthHistory(items) => self.health_history = items,
            DomainUpdate::ExerciseLogs(items) => self.exercise_logs = items,
            DomainUpdate::MealLogs(items) => self.meal_logs = items,
            DomainUpdate::Reflections(items) => self.reflections = items,
            DomainUpdate::ShoppingList(items) => self.shopping_list = items,
            DomainUpdate::Onboarding { complete } => self.onboarding_complete = complete,
            DomainUpdate::Gamification(_) | DomainUpdate::QuotaUsage(_) => return false,
        }
        true
    }

    /// Record today's metrics in the history, replacing any entry for the
    /// same date.
    pub fn record_history(&mut self, date: chrono::NaiveDate, metrics: HealthMetrics) {
        self.health_history.retain(|entry| entry.date != date);
        self.health_history.push(HealthHistoryEntry { date, metrics });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_domains_use_their_wrapper_field() {
        let doc = DomainUpdate::WorkoutPlans(vec![json!({"id": "p1"})])
            .to_document()
            .unwrap();
        assert_eq!(Value::Object(doc), json!({"plans": [{"id": "p1"}]}));

        let doc = DomainUpdate::Reflections(vec![]).to_document().unwrap();
        assert_eq!(Value::Object(doc), json!({"entries": []}));
    }

    #[test]
    fn onboarding_is_wrapped_as_complete_flag() {
        let doc = DomainUpdate::Onboarding { complete: true }.to_document().unwrap();
        assert_eq!(Value::Object(doc), json!({"complete": true}));
    }

    #[test]
    fn non_object_profile_is_rejected() {
        let err = DomainUpdate::UserProfile(json!("just a name"))
            .to_document()
            .unwrap_err();
        assert!(matches!(err, DomainError::Malformed { domain: Domain::UserProfiles, .. }));
    }

    #[test]
    fn decoding_strips_updated_at_and_defaults_missing_lists() {
        let doc = json!({"updatedAt": "2024-01-05T00:00:00.000Z"});
        let update =
            DomainUpdate::from_document(Domain::MealLogs, doc.as_object().cloned().unwrap())
                .unwrap();
        assert_eq!(update, DomainUpdate::MealLogs(vec![]));

        let doc = json!({"steps": 4200, "water": 1.5, "updatedAt": "x"});
        let update =
            DomainUpdate::from_document(Domain::HealthMetrics, doc.as_object().cloned().unwrap())
                .unwrap();
        assert_eq!(
            update,
            DomainUpdate::HealthMetrics(HealthMetrics {
                steps: 4200,
                water: Some(1.5),
                ..HealthMetrics::default()
            })
        );
    }

    #[test]
    fn malformed_list_is_reported() {
        let doc = json!({"logs": 5});
        let err =
            DomainUpdate::from_document(Domain::ExerciseLogs, doc.as_object().cloned().unwrap())
                .unwrap_err();
        assert!(matches!(err, DomainError::Malformed { domain: Domain::ExerciseLogs, .. }));
    }

    #[test]
    fn every_snapshot_domain_round_trips() {
        let mut snapshot = HealthSnapshot {
            user_profile: Some(json!({"name": "Sam", "goals": []})),
            onboarding_complete: true,
            ..HealthSnapshot::default()
        };
        snapshot.health_metrics.steps = 100;
        snapshot.shopping_list.push(json!({"id": "s1", "checked": false}));

        let mut rebuilt = HealthSnapshot::default();
        for update in snapshot.updates() {
            let domain = update.domain();
            let doc = update.to_document().unwrap();
            assert!(rebuilt.apply(DomainUpdate::from_document(domain, doc).unwrap()));
        }
        assert_eq!(rebuilt, snapshot);
    }

    #[test]
    fn gamification_patch_merge_prefers_newer_fields() {
        let older = GamificationPatch {
            total_points: Some(10),
            streaks: Some(vec![]),
            ..Default::default()
        };
        let newer = GamificationPatch {
            total_points: Some(35),
            ..Default::default()
        };
        let merged = older.merge(newer);
        assert_eq!(merged.total_points, Some(35));
        assert_eq!(merged.streaks, Some(vec![]));
        assert!(merged.achievements.is_none());

        let doc = DomainUpdate::Gamification(merged).to_document().unwrap();
        assert_eq!(Value::Object(doc), json!({"streaks": [], "totalPoints": 35}));
    }

    #[test]
    fn history_keeps_one_entry_per_day() {
        let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let mut snapshot = HealthSnapshot::default();
        snapshot.record_history(day, HealthMetrics { steps: 10, ..Default::default() });
        snapshot.record_history(day, HealthMetrics { steps: 20, ..Default::default() });
        assert_eq!(snapshot.health_history.len(), 1);
        assert_eq!(snapshot.health_history[0].metrics.steps, 20);
    }
}
