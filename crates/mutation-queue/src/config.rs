use std::time::Duration;
use sync_config_and_utils::SyncTuning;

/// Timing knobs for the mutation queue.
///
/// Defaults: 500ms debounce, retries at 1s, 2s, 4s... capped at 10s,
/// three attempts per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Quiet time after the last debounced enqueue before dispatching.
    pub debounce: Duration,
    /// Delay before the first retry.
    pub retry_base: Duration,
    /// Upper bound on any retry delay.
    pub retry_max: Duration,
    /// Total write attempts per cycle, including the first.
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::from(&SyncTuning::default())
    }
}

impl From<&SyncTuning> for QueueConfig {
    fn from(tuning: &SyncTuning) -> Self {
        Self {
            debounce: tuning.debounce(),
            retry_base: tuning.retry_base(),
            retry_max: tuning.retry_max(),
            max_attempts: tuning.max_attempts.max(1),
        }
    }
}
