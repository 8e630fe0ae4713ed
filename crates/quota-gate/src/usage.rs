//! The per-user usage document.

use crate::{Period, QuotaMetric};
use chrono::NaiveDate;
use remote_store::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Counters for one user, with the start of the period each group counts.
///
/// Periods roll over lazily: nothing resets at midnight. A counter whose
/// period start is not the current one reads as zero, and the next
/// increment rewrites the whole group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotaUsage {
    pub user_id: String,
    pub workout_plans_this_month: u32,
    pub meal_plans_this_month: u32,
    pub ai_coach_messages_today: u32,
    pub exercise_logs_today: u32,
    pub meal_logs_today: u32,
    pub wellness_check_ins_today: u32,
    /// First day of the month the monthly counters cover.
    #[serde(with = "day", skip_serializing_if = "Option::is_none")]
    pub current_period_start: Option<NaiveDate>,
    /// Day the daily counters cover.
    #[serde(with = "day", skip_serializing_if = "Option::is_none")]
    pub daily_period_start: Option<NaiveDate>,
}

impl QuotaUsage {
    /// Fresh counters for `today`.
    pub fn new(user_id: &str, today: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            current_period_start: Some(Period::Monthly.start_for(today)),
            daily_period_start: Some(Period::Daily.start_for(today)),
            ..Self::default()
        }
    }

    pub fn from_document(doc: Document) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(doc))
    }

    pub fn to_document(&self) -> serde_json::Result<Document> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Document::new()),
        }
    }

    fn period_start(&self, period: Period) -> Option<NaiveDate> {
        match period {
            Period::Daily => self.daily_period_start,
            Period::Monthly => self.current_period_start,
        }
    }

    fn is_current(&self, period: Period, today: NaiveDate) -> bool {
        self.period_start(period) == Some(period.start_for(today))
    }

    fn counter_mut(&mut self, metric: QuotaMetric) -> &mut u32 {
        match metric {
            QuotaMetric::WorkoutPlans => &mut self.workout_plans_this_month,
            QuotaMetric::MealPlans => &mut self.meal_plans_this_month,
            QuotaMetric::AiCoachMessages => &mut self.ai_coach_messages_today,
            QuotaMetric::ExerciseLogs => &mut self.exercise_logs_today,
            QuotaMetric::MealLogs => &mut self.meal_logs_today,
            QuotaMetric::WellnessCheckIns => &mut self.wellness_check_ins_today,
        }
    }

    /// Usage of `metric` in the period containing `today`.
    pub fn used(&self, metric: QuotaMetric, today: NaiveDate) -> u32 {
        if !self.is_current(metric.period(), today) {
            return 0;
        }
        match metric {
            QuotaMetric::WorkoutPlans => self.workout_plans_this_month,
            QuotaMetric::MealPlans => self.meal_plans_this_month,
            QuotaMetric::AiCoachMessages => self.ai_coach_messages_today,
            QuotaMetric::ExerciseLogs => self.exercise_logs_today,
            QuotaMetric::MealLogs => self.meal_logs_today,
            QuotaMetric::WellnessCheckIns => self.wellness_check_ins_today,
        }
    }

    /// Zero every counter whose period has ended.
    pub fn roll_over(&mut self, today: NaiveDate) {
        for period in [Period::Daily, Period::Monthly] {
            if self.is_current(period, today) {
                continue;
            }
            for metric in QuotaMetric::ALL.into_iter().filter(|m| m.period() == period) {
                *self.counter_mut(metric) = 0;
            }
            let start = Some(period.start_for(today));
            match period {
                Period::Daily => self.daily_period_start = start,
                Period::Monthly => self.current_period_start = start,
            }
        }
    }

    /// Add one use of `metric` on `today`, rolling stale periods first.
    pub fn increment(&mut self, metric: QuotaMetric, today: NaiveDate) -> u32 {
        self.roll_over(today);
        let counter = self.counter_mut(metric);
        *counter = counter.saturating_add(1);
        *counter
    }
}

mod day {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&date.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        // Full ISO timestamps are accepted; only the day matters.
        let day = raw.get(..10).unwrap_or(&raw);
        Ok(NaiveDate::parse_from_str(day, FORMAT).ok())
    }
}
