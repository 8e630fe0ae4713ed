use serde::{Deserialize, Serialize};

/// Reminder preferences, stored alongside gamification state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub exercise_reminders: bool,
    /// `HH:MM`
    pub exercise_time: String,
    pub water_reminders: bool,
    /// Hours between water reminders.
    pub water_interval: u32,
    pub meal_reminders: bool,
    pub meal_times: Vec<String>,
    pub checkin_reminders: bool,
    pub checkin_time: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            exercise_reminders: true,
            exercise_time: "09:00".to_string(),
            water_reminders: true,
            water_interval: 2,
            meal_reminders: true,
            meal_times: vec!["08:00".into(), "12:30".into(), "19:00".into()],
            checkin_reminders: true,
            checkin_time: "20:00".to_string(),
        }
    }
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationSettingsPatch {
    pub exercise_reminders: Option<bool>,
    pub exercise_time: Option<String>,
    pub water_reminders: Option<bool>,
    pub water_interval: Option<u32>,
    pub meal_reminders: Option<bool>,
    pub meal_times: Option<Vec<String>>,
    pub checkin_reminders: Option<bool>,
    pub checkin_time: Option<String>,
}

impl NotificationSettings {
    pub fn apply(&self, patch: NotificationSettingsPatch) -> NotificationSettings {
        NotificationSettings {
            exercise_reminders: patch.exercise_reminders.unwrap_or(self.exercise_reminders),
            exercise_time: patch.exercise_time.unwrap_or_else(|| self.exercise_time.clone()),
            water_reminders: patch.water_reminders.unwrap_or(self.water_reminders),
            water_interval: patch.water_interval.unwrap_or(self.water_interval),
            meal_reminders: patch.meal_reminders.unwrap_or(self.meal_reminders),
            meal_times: patch.meal_times.unwrap_or_else(|| self.meal_times.clone()),
            checkin_reminders: patch.checkin_reminders.unwrap_or(self.checkin_reminders),
            checkin_time: patch.checkin_time.unwrap_or_else(|| self.checkin_time.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_overrides_only_given_fields() {
        let settings = NotificationSettings::default().apply(NotificationSettingsPatch {
            water_interval: Some(3),
            checkin_reminders: Some(false),
            ..Default::default()
        });
        assert_eq!(settings.water_interval, 3);
        assert!(!settings.checkin_reminders);
        assert_eq!(settings.exercise_time, "09:00");
    }
}
