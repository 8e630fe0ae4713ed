//! # Quota Gate
//!
//! Bounds how often a user may perform metered actions, per subscription
//! plan.
//!
//! ```text
//! check_quota ──deny──▶ QuotaError::Exceeded (action never runs)
//!      │
//!    allow ──▶ action ──ok──▶ increment_quota
//! ```
//!
//! Counters live in the user's `quotaUsage` document and roll over lazily:
//! a counter whose period started before the current day (or month) reads
//! as zero. Checks fail closed when the document cannot be read.
//!
//! Check and increment are separate steps with no cross-device lock, so
//! concurrent devices can overshoot a limit slightly. Increments within one
//! process are serialized.

mod error;
mod gate;
mod plan;
mod table;
mod usage;

pub use error::{QuotaError, QuotaResult};
pub use gate::{QuotaCheck, QuotaGate};
pub use plan::{is_near_limit, quota_percentage, Period, Plan, QuotaLimit, QuotaMetric};
pub use table::{PlanLimits, QuotaTable};
pub use usage::QuotaUsage;
