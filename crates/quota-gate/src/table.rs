//! Per-plan limits, with defaults and admin overrides.

use crate::{Plan, QuotaLimit, QuotaMetric, QuotaResult};
use remote_store::{merge_documents, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use sync_config_and_utils::{CoreError, Paths};
use tracing::debug;

/// Limits for a single plan. Unknown fields in stored tables are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub workout_plans_per_month: QuotaLimit,
    pub meal_plans_per_month: QuotaLimit,
    pub ai_coach_messages_per_day: QuotaLimit,
    pub exercise_logs_per_day: QuotaLimit,
    pub meal_logs_per_day: QuotaLimit,
    pub wellness_check_ins_per_day: QuotaLimit,
}

impl PlanLimits {
    const fn limited(plans: u32, daily: u32, check_ins: u32) -> Self {
        Self {
            workout_plans_per_month: QuotaLimit::Limited(plans),
            meal_plans_per_month: QuotaLimit::Limited(plans),
            ai_coach_messages_per_day: QuotaLimit::Limited(daily),
            exercise_logs_per_day: QuotaLimit::Limited(daily),
            meal_logs_per_day: QuotaLimit::Limited(daily),
            wellness_check_ins_per_day: QuotaLimit::Limited(check_ins),
        }
    }

    const fn unlimited() -> Self {
        Self {
            workout_plans_per_month: QuotaLimit::Unlimited,
            meal_plans_per_month: QuotaLimit::Unlimited,
            ai_coach_messages_per_day: QuotaLimit::Unlimited,
            exercise_logs_per_day: QuotaLimit::Unlimited,
            meal_logs_per_day: QuotaLimit::Unlimited,
            wellness_check_ins_per_day: QuotaLimit::Unlimited,
        }
    }

    pub fn limit(&self, metric: QuotaMetric) -> QuotaLimit {
        match metric {
            QuotaMetric::WorkoutPlans => self.workout_plans_per_month,
            QuotaMetric::MealPlans => self.meal_plans_per_month,
            QuotaMetric::AiCoachMessages => self.ai_coach_messages_per_day,
            QuotaMetric::ExerciseLogs => self.exercise_logs_per_day,
            QuotaMetric::MealLogs => self.meal_logs_per_day,
            QuotaMetric::WellnessCheckIns => self.wellness_check_ins_per_day,
        }
    }
}

/// Plan to limits lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotaTable {
    plans: HashMap<Plan, PlanLimits>,
}

impl Default for QuotaTable {
    fn default() -> Self {
        let plans = HashMap::from([
            (Plan::Free, PlanLimits::limited(3, 5, 1)),
            (Plan::Basic, PlanLimits::limited(10, 20, 3)),
            (Plan::Pro, PlanLimits::limited(50, 100, 10)),
            (Plan::Premium, PlanLimits::unlimited()),
        ]);
        Self { plans }
    }
}

impl QuotaTable {
    /// Limit for `metric` on `plan`. A plan missing from the table falls
    /// back to the free tier.
    pub fn limit(&self, plan: Plan, metric: QuotaMetric) -> QuotaLimit {
        self.plans
            .get(&plan)
            .or_else(|| self.plans.get(&Plan::Free))
            .map(|limits| limits.limit(metric))
            .unwrap_or(QuotaLimit::Limited(0))
    }

    pub fn plan(&self, plan: Plan) -> Option<&PlanLimits> {
        self.plans.get(&plan)
    }

    /// Defaults with `overrides` deep-merged on top. Overrides may name a
    /// subset of plans and a subset of fields per plan.
    pub fn with_overrides(overrides: &Document) -> QuotaResult<Self> {
        let mut merged = match serde_json::to_value(Self::default()).map_err(CoreError::from)? {
            Value::Object(map) => map,
            _ => Document::new(),
        };
        merge_documents(&mut merged, overrides.clone());
        let table = serde_json::from_value(Value::Object(merged)).map_err(CoreError::from)?;
        Ok(table)
    }

    /// Load overrides from the quota table file, falling back to defaults.
    pub fn load(paths: &Paths) -> QuotaResult<Self> {
        let path = paths.quota_table_file();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(CoreError::from)?;
        let overrides: Document = serde_json::from_str(&content).map_err(CoreError::from)?;
        debug!(path = %path.display(), plans = overrides.len(), "Loaded quota overrides");
        Self::with_overrides(&overrides)
    }
}
