use crate::QueueConfig;
use std::time::Duration;

/// Delay before retry number `retry_count` (1-based).
///
/// `base * 2^(retry_count - 1)`, capped at `retry_max`.
pub fn compute_backoff(retry_count: u32, config: &QueueConfig) -> Duration {
    if retry_count == 0 {
        return Duration::ZERO;
    }

    let base_ms = config.retry_base.as_millis() as u64;
    let max_ms = config.retry_max.as_millis() as u64;
    let shift = retry_count.saturating_sub(1);
    let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(multiplier).min(max_ms);

    Duration::from_millis(delay_ms)
}
