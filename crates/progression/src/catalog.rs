//! Built-in achievements, streaks and the signals that drive them.

use crate::{Achievement, AchievementKind, Rarity, Streak, StreakKind};

/// Something observed in the user's data that can move an achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Steps recorded for today.
    Steps(u32),
    /// Total exercise logs.
    WorkoutsLogged(u32),
    /// Total wellness check-ins.
    CheckInsLogged(u32),
    /// Total meal logs.
    MealsLogged(u32),
    /// Current value of a streak.
    StreakValue(StreakKind, u32),
}

impl Signal {
    pub fn value(self) -> u32 {
        match self {
            Signal::Steps(v)
            | Signal::WorkoutsLogged(v)
            | Signal::CheckInsLogged(v)
            | Signal::MealsLogged(v)
            | Signal::StreakValue(_, v) => v,
        }
    }
}

/// Achievement ids fed by `signal`.
pub fn triggered_achievements(signal: Signal) -> &'static [&'static str] {
    match signal {
        Signal::Steps(_) => &["first_step", "walker", "marathon"],
        Signal::WorkoutsLogged(_) => &["first_workout", "workout_warrior"],
        Signal::CheckInsLogged(_) => &["mindful_week"],
        Signal::MealsLogged(_) => &["meal_tracker", "nutrition_master"],
        Signal::StreakValue(StreakKind::Workout, _) => &["week_streak", "month_streak"],
        Signal::StreakValue(StreakKind::Water, _) => &["hydration_hero"],
        Signal::StreakValue(StreakKind::Sleep, _) => &["sleep_champion"],
        Signal::StreakValue(StreakKind::CheckIn, _) => &[],
    }
}

fn entry(
    id: &str,
    kind: AchievementKind,
    title: &str,
    description: &str,
    icon: &str,
    target: u32,
    rarity: Rarity,
) -> Achievement {
    Achievement {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        unlocked: false,
        unlocked_at: None,
        progress: 0,
        target,
        rarity,
    }
}

pub fn default_achievements() -> Vec<Achievement> {
    use AchievementKind as K;
    vec![
        entry("first_step", K::Steps, "First Steps", "Walk 1,000 steps in a day", "👣", 1000, Rarity::Common),
        entry("walker", K::Steps, "Daily Walker", "Walk 10,000 steps in a day", "🚶", 10_000, Rarity::Rare),
        entry("marathon", K::Steps, "Marathon Walker", "Walk 20,000 steps in a day", "🏃", 20_000, Rarity::Epic),
        entry("first_workout", K::Workout, "First Workout", "Complete your first workout", "💪", 1, Rarity::Common),
        entry("workout_warrior", K::Workout, "Workout Warrior", "Complete 10 workouts", "🏋️", 10, Rarity::Rare),
        entry("week_streak", K::Streak, "Week Warrior", "Maintain a 7-day workout streak", "🔥", 7, Rarity::Rare),
        entry("month_streak", K::Streak, "Consistency Champion", "Maintain a 30-day workout streak", "⚡", 30, Rarity::Legendary),
        entry("hydration_hero", K::Water, "Hydration Hero", "Drink 2L of water for 7 days", "💧", 7, Rarity::Rare),
        entry("sleep_champion", K::Sleep, "Sleep Champion", "Get 7+ hours of sleep for 7 days", "🌙", 7, Rarity::Rare),
        entry("mindful_week", K::CheckIn, "Mindful Week", "Complete wellness check-ins for 7 days", "🧘", 7, Rarity::Rare),
        entry("meal_tracker", K::Meal, "Meal Tracker", "Log 10 meals", "🍎", 10, Rarity::Common),
        entry("nutrition_master", K::Meal, "Nutrition Master", "Log 50 meals", "🥗", 50, Rarity::Epic),
    ]
}

pub fn default_streaks() -> Vec<Streak> {
    StreakKind::ALL.into_iter().map(Streak::new).collect()
}
