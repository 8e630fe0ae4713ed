//! Queued per-domain sync and loading.

use crate::{
    Domain, DomainResult, DomainUpdate, DomainWrite, GamificationPatch, HealthSnapshot,
    StoreWriter,
};
use futures_util::future::join_all;
use mutation_queue::{EnqueueOptions, MutationHandle, MutationQueue, QueueConfig};
use progression::ProgressionState;
use remote_store::{Document, RemoteStore, StoreError};
use std::sync::Arc;
use sync_config_and_utils::Clock;
use tracing::{debug, info, warn};

/// Per-domain sync over a shared [`MutationQueue`].
pub struct DomainSync {
    store: Arc<dyn RemoteStore>,
    queue: MutationQueue<StoreWriter>,
}

impl DomainSync {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: QueueConfig) -> Self {
        let writer = Arc::new(StoreWriter::new(Arc::clone(&store), clock));
        Self {
            store,
            queue: MutationQueue::new(writer, config),
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn queue(&self) -> &MutationQueue<StoreWriter> {
        &self.queue
    }

    /// Default queue behavior per domain.
    ///
    /// Gamification patches merge field by field; quota counters skip the
    /// debounce window; everything else debounces and replaces.
    pub fn options_for(domain: Domain) -> EnqueueOptions<DomainWrite> {
        match domain {
            Domain::Gamification => EnqueueOptions::debounced().with_merge(DomainWrite::merged_with),
            Domain::QuotaUsage => EnqueueOptions::priority(),
            _ => EnqueueOptions::debounced(),
        }
    }

    /// Queue one domain update with its default options.
    pub fn enqueue(&self, user_id: &str, update: DomainUpdate) -> DomainResult<MutationHandle> {
        let options = Self::options_for(update.domain());
        self.enqueue_with(user_id, update, options)
    }

    pub fn enqueue_with(
        &self,
        user_id: &str,
        update: DomainUpdate,
        options: EnqueueOptions<DomainWrite>,
    ) -> DomainResult<MutationHandle> {
        let write = encode(user_id, &update)?;
        Ok(self
            .queue
            .enqueue(write.domain.key(user_id), write, options))
    }

    /// Queue every update, one mutation per domain, then wait for all of
    /// them. Fails with the first error once every write has settled.
    pub async fn sync_partial(
        &self,
        user_id: &str,
        updates: impl IntoIterator<Item = DomainUpdate>,
    ) -> DomainResult<()> {
        let writes = updates
            .into_iter()
            .map(|update| {
                let options = Self::options_for(update.domain());
                encode(user_id, &update).map(|write| (write, options))
            })
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(user_id = %user_id, domains = writes.len(), "Partial sync");
        let handles: Vec<_> = writes
            .into_iter()
            .map(|(write, options)| self.queue.enqueue(write.domain.key(user_id), write, options))
            .collect();
        settle_all(handles).await
    }

    /// Write every health domain at once, skipping the debounce window.
    pub async fn sync_full(&self, user_id: &str, snapshot: &HealthSnapshot) -> DomainResult<()> {
        let writes = snapshot
            .updates()
            .iter()
            .map(|update| encode(user_id, update))
            .collect::<DomainResult<Vec<_>>>()?;

        info!(user_id = %user_id, domains = writes.len(), "Full sync");
        let handles: Vec<_> = writes
            .into_iter()
            .map(|write| {
                self.queue
                    .enqueue(write.domain.key(user_id), write, EnqueueOptions::immediate())
            })
            .collect();
        settle_all(handles).await
    }

    /// Queue a gamification patch and wait for it to land.
    pub async fn sync_gamification(
        &self,
        user_id: &str,
        patch: GamificationPatch,
    ) -> DomainResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.enqueue(user_id, DomainUpdate::Gamification(patch))?
            .await?;
        Ok(())
    }

    /// Read one raw domain document.
    pub async fn read(&self, domain: Domain, user_id: &str) -> DomainResult<Option<Document>> {
        Ok(self.store.get(domain.collection(), user_id).await?)
    }

    /// Load every health domain concurrently.
    ///
    /// A failed or malformed domain degrades to its default. Returns `None`
    /// for a new account (no profile, metrics or onboarding document), and
    /// an error when that cannot be decided because those reads failed.
    pub async fn load(&self, user_id: &str) -> DomainResult<Option<HealthSnapshot>> {
        let reads = Domain::HEALTH
            .into_iter()
            .map(|domain| self.store.get(domain.collection(), user_id));
        let results = join_all(reads).await;

        let mut snapshot = HealthSnapshot::default();
        let mut account_exists = false;
        let mut identity_failure: Option<StoreError> = None;

        for (domain, result) in Domain::HEALTH.into_iter().zip(results) {
            let identifies_account = matches!(
                domain,
                Domain::UserProfiles | Domain::HealthMetrics | Domain::Onboarding
            );
            match result {
                Ok(Some(doc)) => {
                    account_exists |= identifies_account;
                    match DomainUpdate::from_document(domain, doc) {
                        Ok(update) => {
                            snapshot.apply(update);
                        }
                        Err(err) => {
                            warn!(user_id = %user_id, domain = %domain, error = %err, "Ignoring malformed document");
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(user_id = %user_id, domain = %domain, error = %err, "Failed to load domain");
                    if identifies_account && identity_failure.is_none() {
                        identity_failure = Some(err);
                    }
                }
            }
        }

        if account_exists {
            return Ok(Some(snapshot));
        }
        match identity_failure {
            Some(err) => Err(err.into()),
            None => {
                info!(user_id = %user_id, "No stored health data");
                Ok(None)
            }
        }
    }

    /// Load the gamification document, filling in catalog entries it lacks.
    pub async fn load_gamification(&self, user_id: &str) -> DomainResult<Option<ProgressionState>> {
        let Some(doc) = self.read(Domain::Gamification, user_id).await? else {
            return Ok(None);
        };
        let DomainUpdate::Gamification(patch) =
            DomainUpdate::from_document(Domain::Gamification, doc)?
        else {
            return Ok(None);
        };

        let mut state = ProgressionState::default();
        patch.apply_to(&mut state);
        state.ensure_catalog();
        Ok(Some(state))
    }
}

fn encode(user_id: &str, update: &DomainUpdate) -> DomainResult<DomainWrite> {
    Ok(DomainWrite {
        domain: update.domain(),
        user_id: user_id.to_string(),
        data: update.to_document()?,
    })
}

async fn settle_all(handles: Vec<MutationHandle>) -> DomainResult<()> {
    let results = join_all(handles).await;
    match results.into_iter().find_map(Result::err) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HealthMetrics, WellnessCheckIn, MoodLevel};
    use chrono::NaiveDate;
    use remote_store::InMemoryStore;
    use serde_json::{json, Value};
    use std::time::Duration;
    use sync_config_and_utils::FixedClock;

    fn setup() -> (Arc<InMemoryStore>, DomainSync) {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::on_day(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()));
        let sync = DomainSync::new(store.clone(), clock, QueueConfig::default());
        (store, sync)
    }

    fn check_in(id: &str) -> WellnessCheckIn {
        WellnessCheckIn {
            id: id.into(),
            date: "2024-01-05T08:00:00.000Z".into(),
            mood: MoodLevel::Good,
            stress_level: 3,
            energy_level: 7,
            sleep_quality: 8,
            notes: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn partial_sync_writes_only_given_domains() {
        let (store, sync) = setup();

        sync.sync_partial(
            "u1",
            [
                DomainUpdate::HealthMetrics(HealthMetrics { steps: 1200, ..Default::default() }),
                DomainUpdate::WellnessCheckIns(vec![check_in("c1")]),
            ],
        )
        .await
        .unwrap();

        assert_eq!(store.write_log().len(), 2);
        let metrics = store.document("healthMetrics", "u1").unwrap();
        assert_eq!(metrics["steps"], json!(1200));
        assert_eq!(metrics["updatedAt"], json!("2024-01-05T12:00:00.000Z"));

        let check_ins = store.document("wellnessCheckIns", "u1").unwrap();
        assert_eq!(check_ins["checkIns"][0]["id"], json!("c1"));
        assert!(store.document("mealLogs", "u1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_to_one_domain_coalesce() {
        let (store, sync) = setup();

        let handles: Vec<_> = (1..=4)
            .map(|steps| {
                sync.enqueue(
                    "u1",
                    DomainUpdate::HealthMetrics(HealthMetrics { steps, ..Default::default() }),
                )
                .unwrap()
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let writes = store.writes_to("healthMetrics", "u1");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data["steps"], json!(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gamification_patches_merge_into_one_write() {
        let (store, sync) = setup();

        let a = sync
            .enqueue(
                "u1",
                DomainUpdate::Gamification(GamificationPatch {
                    total_points: Some(25),
                    ..Default::default()
                }),
            )
            .unwrap();
        let b = sync
            .enqueue(
                "u1",
                DomainUpdate::Gamification(GamificationPatch {
                    weekly_goals: Some(vec![]),
                    ..Default::default()
                }),
            )
            .unwrap();
        a.await.unwrap();
        b.await.unwrap();

        let writes = store.writes_to("gamification", "u1");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].data.get("totalPoints"), Some(&json!(25)));
        assert_eq!(writes[0].data.get("weeklyGoals"), Some(&json!([])));
    }

    #[tokio::test(start_paused = true)]
    async fn full_sync_then_load_round_trips() {
        let (store, sync) = setup();
        let mut snapshot = HealthSnapshot {
            user_profile: Some(json!({"name": "Sam", "goals": ["sleep"]})),
            onboarding_complete: true,
            ..HealthSnapshot::default()
        };
        snapshot.health_metrics.steps = 8000;
        snapshot.wellness_check_ins.push(check_in("c1"));

        sync.sync_full("u1", &snapshot).await.unwrap();
        assert_eq!(store.write_log().len(), Domain::HEALTH.len());

        let loaded = sync.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test(start_paused = true)]
    async fn cleared_field_is_removed_from_stored_document() {
        let (store, sync) = setup();
        let metrics = HealthMetrics {
            steps: 100,
            water: Some(2.0),
            ..Default::default()
        };
        sync.sync_partial("u1", [DomainUpdate::HealthMetrics(metrics)])
            .await
            .unwrap();

        let cleared = HealthMetrics {
            steps: 200,
            water: None,
            ..Default::default()
        };
        sync.sync_partial("u1", [DomainUpdate::HealthMetrics(cleared.clone())])
            .await
            .unwrap();

        let stored = store.document("healthMetrics", "u1").unwrap();
        assert_eq!(stored["steps"], json!(200));
        assert!(stored.get("water").is_none());

        let loaded = sync.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.health_metrics, cleared);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_to_one_document_never_overlap() {
        let (store, sync) = setup();
        store.set_write_latency(Duration::from_millis(300));
        let metrics = |steps| {
            DomainUpdate::HealthMetrics(HealthMetrics {
                steps,
                ..Default::default()
            })
        };

        let first = sync
            .enqueue_with("u1", metrics(1), EnqueueOptions::immediate())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sync.queue().status("healthMetrics-u1").phase,
            mutation_queue::KeyPhase::InFlight
        );

        let second = sync
            .enqueue_with("u1", metrics(2), EnqueueOptions::immediate())
            .unwrap();
        let third = sync
            .enqueue_with("u1", metrics(3), EnqueueOptions::immediate())
            .unwrap();
        first.await.unwrap();
        second.await.unwrap();
        third.await.unwrap();

        assert_eq!(store.max_concurrent_writes("healthMetrics", "u1"), 1);
        let writes = store.writes_to("healthMetrics", "u1");
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].data["steps"], json!(3));
    }

    #[tokio::test]
    async fn load_of_new_account_is_none() {
        let (_store, sync) = setup();
        assert!(sync.load("nobody").await.unwrap().is_none());
        assert!(sync.load_gamification("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_reads_degrade_to_defaults() {
        let (store, sync) = setup();
        store.put_remote(
            "healthMetrics",
            "u1",
            json!({"steps": 10}).as_object().cloned().unwrap(),
        );
        store.put_remote(
            "mealLogs",
            "u1",
            json!({"logs": "garbage"}).as_object().cloned().unwrap(),
        );
        // The first read (user profile) fails.
        store.fail_next_reads(1, StoreError::Transient("offline".into()));

        let loaded = sync.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.health_metrics.steps, 10);
        assert!(loaded.user_profile.is_none());
        assert!(loaded.meal_logs.is_empty());
    }

    #[tokio::test]
    async fn unreadable_account_is_an_error_not_a_new_account() {
        let (store, sync) = setup();
        store.fail_next_reads(Domain::HEALTH.len(), StoreError::Transient("offline".into()));
        assert!(sync.load("u1").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn load_gamification_fills_catalog() {
        let (store, sync) = setup();
        store.put_remote(
            "gamification",
            "u1",
            json!({"totalPoints": 35, "achievements": [], "updatedAt": "x"})
                .as_object()
                .cloned()
                .unwrap(),
        );

        let state = sync.load_gamification("u1").await.unwrap().unwrap();
        assert_eq!(state.total_points, 35);
        assert_eq!(state.achievements.len(), 12);
        assert_eq!(state.streaks.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permission_error_surfaces_from_partial_sync() {
        let (store, sync) = setup();
        store.fail_next_writes(1, StoreError::PermissionDenied("rules".into()));

        let err = sync
            .sync_partial("u1", [DomainUpdate::Onboarding { complete: true }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(store.write_attempts(), 1);
        assert_eq!(
            Value::Object(store.document("onboarding", "u1").unwrap_or_default()),
            json!({})
        );
    }
}
