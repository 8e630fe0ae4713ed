//! Plans, metrics, periods and limits.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Basic,
    Pro,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Basic, Plan::Pro, Plan::Premium];

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|plan| plan.as_str() == s)
            .ok_or_else(|| format!("unknown plan: {s}"))
    }
}

/// How often a metric's counter resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
}

impl Period {
    /// First day of the period containing `today`.
    pub fn start_for(self, today: NaiveDate) -> NaiveDate {
        match self {
            Period::Daily => today,
            Period::Monthly => today.with_day(1).unwrap_or(today),
        }
    }
}

/// A metered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaMetric {
    WorkoutPlans,
    MealPlans,
    AiCoachMessages,
    ExerciseLogs,
    MealLogs,
    WellnessCheckIns,
}

impl QuotaMetric {
    pub const ALL: [QuotaMetric; 6] = [
        QuotaMetric::WorkoutPlans,
        QuotaMetric::MealPlans,
        QuotaMetric::AiCoachMessages,
        QuotaMetric::ExerciseLogs,
        QuotaMetric::MealLogs,
        QuotaMetric::WellnessCheckIns,
    ];

    pub fn period(self) -> Period {
        match self {
            QuotaMetric::WorkoutPlans | QuotaMetric::MealPlans => Period::Monthly,
            _ => Period::Daily,
        }
    }

    /// Counter field in the usage document.
    pub fn usage_field(self) -> &'static str {
        match self {
            QuotaMetric::WorkoutPlans => "workoutPlansThisMonth",
            QuotaMetric::MealPlans => "mealPlansThisMonth",
            QuotaMetric::AiCoachMessages => "aiCoachMessagesToday",
            QuotaMetric::ExerciseLogs => "exerciseLogsToday",
            QuotaMetric::MealLogs => "mealLogsToday",
            QuotaMetric::WellnessCheckIns => "wellnessCheckInsToday",
        }
    }
}

impl fmt::Display for QuotaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.usage_field())
    }
}

/// Ceiling for one metric. Stored as `-1` when unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    Limited(u32),
    Unlimited,
}

impl QuotaLimit {
    pub fn allows(self, used: u32) -> bool {
        match self {
            QuotaLimit::Limited(limit) => used < limit,
            QuotaLimit::Unlimited => true,
        }
    }

    /// Stored representation.
    pub fn as_i64(self) -> i64 {
        match self {
            QuotaLimit::Limited(limit) => i64::from(limit),
            QuotaLimit::Unlimited => -1,
        }
    }
}

impl From<i64> for QuotaLimit {
    fn from(raw: i64) -> Self {
        if raw < 0 {
            QuotaLimit::Unlimited
        } else {
            QuotaLimit::Limited(u32::try_from(raw).unwrap_or(u32::MAX))
        }
    }
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaLimit::Limited(limit) => write!(f, "{limit}"),
            QuotaLimit::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl Serialize for QuotaLimit {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(self.as_i64())
    }
}

impl<'de> Deserialize<'de> for QuotaLimit {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        i64::deserialize(d).map(QuotaLimit::from)
    }
}

/// Share of the limit used, 0..=100. Always 0 when unlimited.
pub fn quota_percentage(used: u32, limit: QuotaLimit) -> f64 {
    match limit {
        QuotaLimit::Unlimited => 0.0,
        QuotaLimit::Limited(0) => 100.0,
        QuotaLimit::Limited(limit) => (f64::from(used) / f64::from(limit) * 100.0).min(100.0),
    }
}

/// Whether `used` has reached `threshold` (a fraction, e.g. 0.8) of the
/// limit. Never true when unlimited.
pub fn is_near_limit(used: u32, limit: QuotaLimit, threshold: f64) -> bool {
    match limit {
        QuotaLimit::Unlimited => false,
        QuotaLimit::Limited(limit) => f64::from(used) >= f64::from(limit) * threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_boundary() {
        let limit = QuotaLimit::Limited(10);
        assert!(limit.allows(9));
        assert!(!limit.allows(10));
        assert!(QuotaLimit::Unlimited.allows(u32::MAX));
    }

    #[test]
    fn negative_limit_means_unlimited() {
        assert_eq!(QuotaLimit::from(-1), QuotaLimit::Unlimited);
        assert_eq!(QuotaLimit::from(5), QuotaLimit::Limited(5));
        let parsed: QuotaLimit = serde_json::from_str("-1").unwrap();
        assert_eq!(parsed, QuotaLimit::Unlimited);
        assert_eq!(serde_json::to_string(&QuotaLimit::Unlimited).unwrap(), "-1");
    }

    #[test]
    fn period_starts() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        assert_eq!(Period::Daily.start_for(day), day);
        assert_eq!(
            Period::Monthly.start_for(day),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn percentage_and_near_limit() {
        assert_eq!(quota_percentage(5, QuotaLimit::Limited(10)), 50.0);
        assert_eq!(quota_percentage(15, QuotaLimit::Limited(10)), 100.0);
        assert_eq!(quota_percentage(15, QuotaLimit::Unlimited), 0.0);

        assert!(is_near_limit(8, QuotaLimit::Limited(10), 0.8));
        assert!(!is_near_limit(7, QuotaLimit::Limited(10), 0.8));
        assert!(!is_near_limit(1000, QuotaLimit::Unlimited, 0.8));
    }

    #[test]
    fn plan_parses_from_name() {
        assert_eq!("pro".parse::<Plan>(), Ok(Plan::Pro));
        assert!("gold".parse::<Plan>().is_err());
    }
}
