//! The sync indicator shown to the user.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Snapshot of sync health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    /// Most recent failure not yet dismissed.
    pub last_error: Option<String>,
    /// Failures since the last successful retry.
    pub error_count: u32,
    /// Keys with a write waiting or in flight.
    pub pending_writes: usize,
    /// Keys whose last write failed and is held for a retry.
    pub retained_keys: Vec<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncStatus {
    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }
}

#[derive(Debug, Default)]
struct Inner {
    last_error: Option<String>,
    error_count: u32,
    last_synced_at: Option<DateTime<Utc>>,
}

/// Shared error and success bookkeeping. Cloned into background tasks.
#[derive(Debug, Clone, Default)]
pub(crate) struct SyncTracker {
    inner: Arc<Mutex<Inner>>,
}

impl SyncTracker {
    pub(crate) fn record_error(&self, context: &str, error: &dyn std::fmt::Display) {
        warn!(context = %context, error = %error, "Sync failed");
        let mut inner = self.inner.lock();
        inner.last_error = Some(format!("{context}: {error}"));
        inner.error_count = inner.error_count.saturating_add(1);
    }

    pub(crate) fn record_success(&self, at: DateTime<Utc>) {
        self.inner.lock().last_synced_at = Some(at);
    }

    pub(crate) fn dismiss(&self) {
        self.inner.lock().last_error = None;
    }

    /// Forget every failure after a successful full resync.
    pub(crate) fn reset(&self, at: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.last_error = None;
        inner.error_count = 0;
        inner.last_synced_at = Some(at);
    }

    pub(crate) fn snapshot(&self, pending_writes: usize, retained_keys: Vec<String>) -> SyncStatus {
        let inner = self.inner.lock();
        SyncStatus {
            last_error: inner.last_error.clone(),
            error_count: inner.error_count,
            pending_writes,
            retained_keys,
            last_synced_at: inner.last_synced_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dismiss_keeps_count_and_reset_clears_it() {
        let tracker = SyncTracker::default();
        tracker.record_error("update_metrics", &"offline");
        tracker.record_error("add_meal_log", &"offline");

        let status = tracker.snapshot(1, vec!["mealLogs-u1".into()]);
        assert_eq!(status.last_error.as_deref(), Some("add_meal_log: offline"));
        assert_eq!(status.error_count, 2);

        tracker.dismiss();
        let status = tracker.snapshot(0, Vec::new());
        assert!(!status.has_error());
        assert_eq!(status.error_count, 2);

        let now = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        tracker.reset(now);
        let status = tracker.snapshot(0, Vec::new());
        assert_eq!(status.error_count, 0);
        assert_eq!(status.last_synced_at, Some(now));
    }
}
