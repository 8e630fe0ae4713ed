use crate::LocalCache;
use domain_sync::Domain;
use mutation_queue::LocalWriteClock;
use remote_store::{Document, RemotePush, RemoteStore, StoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A push from the store, stamped on arrival.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshotEvent {
    pub domain: Domain,
    pub user_id: String,
    pub data: Option<Document>,
    pub received_at: Instant,
}

impl RemoteSnapshotEvent {
    /// Stamp a push received now. `None` for collections that are not a
    /// known domain.
    pub fn from_push(push: RemotePush) -> Option<Self> {
        Some(Self {
            domain: Domain::from_collection(&push.collection)?,
            user_id: push.id,
            data: push.data,
            received_at: Instant::now(),
        })
    }

    pub fn key(&self) -> String {
        self.domain.key(&self.user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Written to the cache and broadcast.
    Applied,
    /// Arrived within the quiet interval of a local write.
    EchoDiscarded,
    /// Same content as the cache already holds.
    Unchanged,
}

/// A remote change that was applied, as seen by observers.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub domain: Domain,
    pub user_id: String,
    pub data: Option<Document>,
}

/// Decides whether pushes are applied or discarded as echoes.
pub struct SnapshotReconciler {
    cache: Arc<LocalCache>,
    local_writes: Arc<dyn LocalWriteClock>,
    quiet_interval: Duration,
    changes: broadcast::Sender<AppliedChange>,
}

impl SnapshotReconciler {
    pub fn new(local_writes: Arc<dyn LocalWriteClock>, quiet_interval: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            cache: Arc::new(LocalCache::new()),
            local_writes,
            quiet_interval,
            changes,
        }
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet_interval
    }

    /// Observe applied changes. Lagging receivers lose the oldest changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AppliedChange> {
        self.changes.subscribe()
    }

    pub fn reconcile(&self, event: RemoteSnapshotEvent) -> ReconcileOutcome {
        let key = event.key();

        if let Some(last_write) = self.local_writes.last_local_write_at(&key) {
            let since_write = event.received_at.saturating_duration_since(last_write);
            if since_write <= self.quiet_interval {
                debug!(
                    key = %key,
                    since_write_ms = since_write.as_millis() as u64,
                    "Discarding echo of local write"
                );
                return ReconcileOutcome::EchoDiscarded;
            }
        }

        if self.cache.matches(&key, event.data.as_ref()) {
            debug!(key = %key, "Push matches cache");
            return ReconcileOutcome::Unchanged;
        }

        self.cache.apply_remote(&key, event.data.clone());
        info!(key = %key, exists = event.data.is_some(), "Applied remote change");
        // No receivers is fine.
        let _ = self.changes.send(AppliedChange {
            domain: event.domain,
            user_id: event.user_id,
            data: event.data,
        });
        ReconcileOutcome::Applied
    }

    /// Subscribe to `domain/user_id` and reconcile every push until the
    /// returned handle is dropped.
    pub fn watch(
        self: &Arc<Self>,
        store: &dyn RemoteStore,
        domain: Domain,
        user_id: &str,
    ) -> StoreResult<WatchHandle> {
        let mut subscription = store.subscribe(domain.collection(), user_id)?;
        let reconciler = Arc::clone(self);
        let key = domain.key(user_id);
        debug!(key = %key, "Watching document");

        let task = tokio::spawn(async move {
            while let Some(push) = subscription.recv().await {
                if let Some(event) = RemoteSnapshotEvent::from_push(push) {
                    reconciler.reconcile(event);
                }
            }
            debug!(key = %key, "Watch ended");
        });
        Ok(WatchHandle { task })
    }
}

/// Keeps a document watch alive. Dropping it unsubscribes.
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_store::InMemoryStore;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ManualWrites {
        at: Mutex<HashMap<String, Instant>>,
    }

    impl ManualWrites {
        fn wrote(&self, key: &str) {
            self.at.lock().unwrap().insert(key.to_string(), Instant::now());
        }
    }

    impl LocalWriteClock for ManualWrites {
        fn last_local_write_at(&self, key: &str) -> Option<Instant> {
            self.at.lock().unwrap().get(key).copied()
        }
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (Arc<ManualWrites>, Arc<SnapshotReconciler>) {
        let writes = Arc::new(ManualWrites::default());
        let reconciler = Arc::new(SnapshotReconciler::new(
            writes.clone(),
            Duration::from_secs(1),
        ));
        (writes, reconciler)
    }

    fn event(data: serde_json::Value) -> RemoteSnapshotEvent {
        RemoteSnapshotEvent {
            domain: Domain::HealthMetrics,
            user_id: "u1".into(),
            data: Some(doc(data)),
            received_at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn push_within_quiet_interval_is_an_echo() {
        let (writes, reconciler) = setup();
        writes.wrote("healthMetrics-u1");

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 1}))),
            ReconcileOutcome::EchoDiscarded
        );
        assert!(reconciler.cache().get("healthMetrics-u1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn push_after_quiet_interval_is_applied() {
        let (writes, reconciler) = setup();
        let mut changes = reconciler.subscribe();
        writes.wrote("healthMetrics-u1");

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 2}))),
            ReconcileOutcome::Applied
        );

        let change = changes.recv().await.unwrap();
        assert_eq!(change.domain, Domain::HealthMetrics);
        assert_eq!(change.data, Some(doc(json!({"steps": 2}))));
    }

    #[tokio::test(start_paused = true)]
    async fn echo_rule_is_per_key() {
        let (writes, reconciler) = setup();
        writes.wrote("mealLogs-u1");
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 3}))),
            ReconcileOutcome::Applied
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identical_push_is_unchanged() {
        let (_writes, reconciler) = setup();
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 4}))),
            ReconcileOutcome::Applied
        );
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 4, "updatedAt": "later"}))),
            ReconcileOutcome::Unchanged
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_echo_of_recorded_local_write_is_unchanged() {
        let (writes, reconciler) = setup();
        writes.wrote("healthMetrics-u1");
        reconciler
            .cache()
            .record_local("healthMetrics-u1", doc(json!({"steps": 9})));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            reconciler.reconcile(event(json!({"steps": 9, "updatedAt": "x"}))),
            ReconcileOutcome::Unchanged
        );
    }

    #[tokio::test(start_paused = true)]
    async fn watch_applies_remote_writes_and_stops_on_drop() {
        let (_writes, reconciler) = setup();
        let store = InMemoryStore::new();
        let mut changes = reconciler.subscribe();

        let handle = reconciler.watch(&store, Domain::HealthMetrics, "u1").unwrap();
        // Initial snapshot of a missing document.
        let first = changes.recv().await.unwrap();
        assert_eq!(first.data, None);

        store.put_remote("healthMetrics", "u1", doc(json!({"steps": 7})));
        let second = changes.recv().await.unwrap();
        assert_eq!(second.data, Some(doc(json!({"steps": 7}))));

        handle.stop();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(store.subscriber_count("healthMetrics", "u1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn watch_discards_echo_of_own_write() {
        let (writes, reconciler) = setup();
        let store = InMemoryStore::new();
        let _handle = reconciler.watch(&store, Domain::HealthMetrics, "u1").unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        writes.wrote("healthMetrics-u1");
        store.put_remote("healthMetrics", "u1", doc(json!({"steps": 1})));
        tokio::time::sleep(Duration::from_millis(1)).await;

        let cached = reconciler.cache().get("healthMetrics-u1").unwrap();
        assert_eq!(cached.data, None);
    }
}
