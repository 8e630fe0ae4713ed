//! Achievements and the unlock latch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rarity tier. Decides how many points an unlock is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl Rarity {
    pub fn points(self) -> u32 {
        match self {
            Rarity::Common => 10,
            Rarity::Rare => 25,
            Rarity::Epic => 50,
            Rarity::Legendary => 100,
        }
    }
}

/// What an achievement measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementKind {
    Steps,
    Workout,
    Streak,
    Water,
    Sleep,
    #[serde(rename = "checkin")]
    CheckIn,
    Meal,
    Milestone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AchievementKind,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    pub progress: u32,
    pub target: u32,
    pub rarity: Rarity,
}

impl Achievement {
    /// Feed an observed value.
    ///
    /// Progress only moves up and never past `target`. Reaching the target
    /// unlocks once and returns the rarity's points; every other call
    /// returns 0. Unlocked achievements are never modified.
    pub fn check(&self, observed: u32, now: DateTime<Utc>) -> (Achievement, u32) {
        if self.unlocked {
            return (self.clone(), 0);
        }

        let progress = self.progress.max(observed.min(self.target));
        let mut next = Achievement {
            progress,
            ..self.clone()
        };

        if progress >= self.target {
            next.unlocked = true;
            next.unlocked_at = Some(now);
            return (next, self.rarity.points());
        }
        (next, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap()
    }

    fn achievement(progress: u32, target: u32, rarity: Rarity) -> Achievement {
        Achievement {
            id: "workout_warrior".into(),
            kind: AchievementKind::Workout,
            title: "Workout Warrior".into(),
            description: "Complete 10 workouts".into(),
            icon: String::new(),
            unlocked: false,
            unlocked_at: None,
            progress,
            target,
            rarity,
        }
    }

    #[test]
    fn rarity_points() {
        assert_eq!(Rarity::Common.points(), 10);
        assert_eq!(Rarity::Rare.points(), 25);
        assert_eq!(Rarity::Epic.points(), 50);
        assert_eq!(Rarity::Legendary.points(), 100);
    }

    #[test]
    fn lower_observation_does_not_regress() {
        let (next, points) = achievement(5, 10, Rarity::Rare).check(3, now());
        assert_eq!(next.progress, 5);
        assert!(!next.unlocked);
        assert_eq!(points, 0);
    }

    #[test]
    fn reaching_target_unlocks_and_clamps() {
        let (next, points) = achievement(5, 10, Rarity::Rare).check(12, now());
        assert_eq!(next.progress, 10);
        assert!(next.unlocked);
        assert_eq!(next.unlocked_at, Some(now()));
        assert_eq!(points, 25);
    }

    #[test]
    fn unlock_is_awarded_once() {
        let (unlocked, _) = achievement(5, 10, Rarity::Epic).check(12, now());
        let later = now() + chrono::Duration::days(1);
        let (again, points) = unlocked.check(20, later);
        assert_eq!(points, 0);
        assert_eq!(again, unlocked);
        assert_eq!(again.progress, 10);
    }

    #[test]
    fn partial_progress_moves_up() {
        let (next, points) = achievement(2, 10, Rarity::Common).check(7, now());
        assert_eq!(next.progress, 7);
        assert_eq!(points, 0);
        assert_eq!(next.unlocked_at, None);
    }

    #[test]
    fn serde_field_names() {
        let json = serde_json::to_value(achievement(1, 10, Rarity::Legendary)).unwrap();
        assert_eq!(json["type"], "workout");
        assert_eq!(json["rarity"], "legendary");
        assert!(json.get("unlockedAt").is_none());
    }
}
