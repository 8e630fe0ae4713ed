use serde::{Deserialize, Serialize};
use std::fmt;

/// A synchronized domain. One document per user in each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Domain {
    UserProfiles,
    HealthMetrics,
    WorkoutPlans,
    MealPlans,
    WellnessCheckIns,
    MentalWellnessPlans,
    HealthHistory,
    ExerciseLogs,
    MealLogs,
    Reflections,
    ShoppingList,
    Onboarding,
    Gamification,
    QuotaUsage,
}

impl Domain {
    pub const ALL: [Domain; 14] = [
        Domain::UserProfiles,
        Domain::HealthMetrics,
        Domain::WorkoutPlans,
        Domain::MealPlans,
        Domain::WellnessCheckIns,
        Domain::MentalWellnessPlans,
        Domain::HealthHistory,
        Domain::ExerciseLogs,
        Domain::MealLogs,
        Domain::Reflections,
        Domain::ShoppingList,
        Domain::Onboarding,
        Domain::Gamification,
        Domain::QuotaUsage,
    ];

    /// Domains that make up a [`HealthSnapshot`](crate::HealthSnapshot).
    pub const HEALTH: [Domain; 12] = [
        Domain::UserProfiles,
        Domain::HealthMetrics,
        Domain::WorkoutPlans,
        Domain::MealPlans,
        Domain::WellnessCheckIns,
        Domain::MentalWellnessPlans,
        Domain::HealthHistory,
        Domain::ExerciseLogs,
        Domain::MealLogs,
        Domain::Reflections,
        Domain::ShoppingList,
        Domain::Onboarding,
    ];

    /// Collection name in the remote store.
    pub fn collection(self) -> &'static str {
        match self {
            Domain::UserProfiles => "userProfiles",
            Domain::HealthMetrics => "healthMetrics",
            Domain::WorkoutPlans => "workoutPlans",
            Domain::MealPlans => "mealPlans",
            Domain::WellnessCheckIns => "wellnessCheckIns",
            Domain::MentalWellnessPlans => "mentalWellnessPlans",
            Domain::HealthHistory => "healthHistory",
            Domain::ExerciseLogs => "exerciseLogs",
            Domain::MealLogs => "mealLogs",
            Domain::Reflections => "reflections",
            Domain::ShoppingList => "shoppingList",
            Domain::Onboarding => "onboarding",
            Domain::Gamification => "gamification",
            Domain::QuotaUsage => "quotaUsage",
        }
    }

    /// Field holding the array for list-valued domains.
    pub fn list_field(self) -> Option<&'static str> {
        match self {
            Domain::WorkoutPlans | Domain::MealPlans | Domain::MentalWellnessPlans => Some("plans"),
            Domain::WellnessCheckIns => Some("checkIns"),
            Domain::HealthHistory => Some("history"),
            Domain::ExerciseLogs | Domain::MealLogs => Some("logs"),
            Domain::Reflections => Some("entries"),
            Domain::ShoppingList => Some("items"),
            Domain::UserProfiles
            | Domain::HealthMetrics
            | Domain::Onboarding
            | Domain::Gamification
            | Domain::QuotaUsage => None,
        }
    }

    /// Whether writes merge into the stored document instead of replacing it.
    ///
    /// Only gamification is written as field patches. Every other domain is
    /// stored as the whole object, so a field cleared locally is cleared
    /// remotely too.
    pub fn merges_on_write(self) -> bool {
        matches!(self, Domain::Gamification)
    }

    pub fn from_collection(name: &str) -> Option<Domain> {
        Domain::ALL.into_iter().find(|d| d.collection() == name)
    }

    /// Queue key for this domain's document of `user_id`.
    pub fn key(self, user_id: &str) -> String {
        format!("{}-{}", self.collection(), user_id)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_collection_and_user() {
        assert_eq!(Domain::HealthMetrics.key("u1"), "healthMetrics-u1");
        assert_eq!(Domain::WellnessCheckIns.key("abc"), "wellnessCheckIns-abc");
    }

    #[test]
    fn collection_names_round_trip() {
        for domain in Domain::ALL {
            assert_eq!(Domain::from_collection(domain.collection()), Some(domain));
        }
        assert_eq!(Domain::from_collection("unknown"), None);
    }

    #[test]
    fn list_wrappers_are_fixed_per_domain() {
        assert_eq!(Domain::WorkoutPlans.list_field(), Some("plans"));
        assert_eq!(Domain::WellnessCheckIns.list_field(), Some("checkIns"));
        assert_eq!(Domain::HealthHistory.list_field(), Some("history"));
        assert_eq!(Domain::MealLogs.list_field(), Some("logs"));
        assert_eq!(Domain::Reflections.list_field(), Some("entries"));
        assert_eq!(Domain::ShoppingList.list_field(), Some("items"));
        assert_eq!(Domain::HealthMetrics.list_field(), None);
    }

    #[test]
    fn only_gamification_merges_on_write() {
        for domain in Domain::ALL {
            assert_eq!(domain.merges_on_write(), domain == Domain::Gamification);
        }
    }
}
