//! # Domain Sync
//!
//! Splits application updates into one queued write per domain document.
//!
//! Every domain is stored as a single document per user: collection is the
//! domain name, document id is the user id, and the queue key is
//! `"{domain}-{userId}"`. Unrelated domains therefore write in parallel
//! while updates to the same domain serialize.
//!
//! List-valued domains are wrapped in an object under a fixed field name
//! (`{ "plans": [...] }`, `{ "logs": [...] }`, ...). Every write is stamped
//! with `updatedAt`.

mod domain;
mod error;
mod sync;
mod types;
mod update;
mod writer;

pub use domain::Domain;
pub use error::{DomainError, DomainResult};
pub use sync::DomainSync;
pub use types::{
    ExerciseIntensity, ExerciseLog, HealthHistoryEntry, HealthMetrics, MealLog, MealPlan,
    MealType, MentalWellnessPlan, MoodLevel, ReflectionEntry, ShoppingItem, UserProfile,
    WellnessCheckIn, WorkoutPlan,
};
pub use update::{DomainUpdate, GamificationPatch, HealthSnapshot};
pub use writer::{DomainWrite, StoreWriter};
