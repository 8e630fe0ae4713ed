//! Domain records.
//!
//! Records the engine computes with are typed. Content produced and consumed
//! only by other layers (profiles, generated plans, reflections, shopping
//! items) is carried as raw JSON so it round-trips untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type UserProfile = Value;
pub type WorkoutPlan = Value;
pub type MealPlan = Value;
pub type MentalWellnessPlan = Value;
pub type ReflectionEntry = Value;
pub type ShoppingItem = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLevel {
    Excellent,
    Good,
    Okay,
    Low,
    Struggling,
}

/// Today's metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    #[serde(default)]
    pub steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    /// Hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    /// Litres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stress: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessCheckIn {
    pub id: String,
    /// ISO 8601 timestamp.
    pub date: String,
    pub mood: MoodLevel,
    pub stress_level: u32,
    pub energy_level: u32,
    pub sleep_quality: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One day's metrics. At most one entry per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthHistoryEntry {
    pub date: NaiveDate,
    pub metrics: HealthMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseIntensity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseLog {
    pub id: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Minutes.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<ExerciseIntensity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealLog {
    pub id: String,
    pub date: String,
    pub meal_type: MealType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
