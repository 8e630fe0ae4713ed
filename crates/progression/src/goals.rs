use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Steps,
    Workout,
    Water,
    Sleep,
    #[serde(rename = "checkin")]
    CheckIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPeriod {
    Week,
    Month,
}

/// A user-defined target for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyGoal {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: GoalKind,
    pub title: String,
    pub target: u32,
    pub current: u32,
    pub period: GoalPeriod,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl WeeklyGoal {
    /// Set progress, clamped to the target.
    pub fn with_progress(&self, progress: u32) -> WeeklyGoal {
        WeeklyGoal {
            current: progress.min(self.target),
            ..self.clone()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.target
    }
}
