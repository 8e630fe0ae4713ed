//! The engine object: session lifecycle, remote watches and sync status.

use crate::{EngineConfig, EngineError, EngineResult, LocalState, SyncStatus, SyncTracker};
use domain_sync::{Domain, DomainSync, DomainUpdate, GamificationPatch, HealthSnapshot};
use futures_util::future::join_all;
use mutation_queue::{KeyPhase, LocalWriteClock, QueueConfig};
use parking_lot::{Mutex, RwLock};
use progression::{evaluate_lapses, Achievement, ProgressionState, Streak};
use quota_gate::{Plan, QuotaGate, QuotaMetric};
use remote_store::RemoteStore;
use snapshot_reconciler::{AppliedChange, SnapshotReconciler, WatchHandle};
use std::future::Future;
use std::sync::Arc;
use sync_config_and_utils::Clock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Domains watched for remote changes while signed in.
const WATCHED: [Domain; 13] = [
    Domain::UserProfiles,
    Domain::HealthMetrics,
    Domain::WorkoutPlans,
    Domain::MealPlans,
    Domain::WellnessCheckIns,
    Domain::MentalWellnessPlans,
    Domain::HealthHistory,
    Domain::ExerciseLogs,
    Domain::MealLogs,
    Domain::Reflections,
    Domain::ShoppingList,
    Domain::Onboarding,
    Domain::Gamification,
];

struct Session {
    user_id: String,
    _watches: Vec<WatchHandle>,
    applier: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.applier.abort();
    }
}

/// Local-first wellness state for one signed-in user.
///
/// Every operation updates the in-memory state synchronously, then hands the
/// affected domains to the mutation queue. Reads never wait on the network.
pub struct WellnessEngine {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) sync: Arc<DomainSync>,
    reconciler: Arc<SnapshotReconciler>,
    quota: QuotaGate,
    plan: RwLock<Plan>,
    pub(crate) state: Arc<Mutex<LocalState>>,
    pub(crate) tracker: SyncTracker,
    session: Mutex<Option<Session>>,
}

impl WellnessEngine {
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let sync = Arc::new(DomainSync::new(
            store,
            Arc::clone(&clock),
            QueueConfig::from(&config.tuning),
        ));
        let local_writes: Arc<dyn LocalWriteClock> = Arc::new(sync.queue().clone());
        let reconciler = Arc::new(SnapshotReconciler::new(
            local_writes,
            config.tuning.quiet_interval(),
        ));
        let quota = QuotaGate::new(Arc::clone(&sync), Arc::clone(&clock), config.quota_table);

        Self {
            clock,
            sync,
            reconciler,
            quota,
            plan: RwLock::new(config.plan),
            state: Arc::new(Mutex::new(LocalState::default())),
            tracker: SyncTracker::default(),
            session: Mutex::new(None),
        }
    }

    /// Sign `user_id` in.
    ///
    /// Loads every domain. A new account is initialised with defaults and
    /// written in one full sync; a missing gamification document is created
    /// from the default catalog. Then remote watches start and lapsed
    /// streaks are evaluated.
    ///
    /// Fails without writing anything when the account's identity documents
    /// or its gamification document cannot be read, so a transient outage
    /// never overwrites stored data with defaults.
    pub async fn bootstrap(&self, user_id: &str) -> EngineResult<()> {
        self.sign_out();
        info!(user_id = %user_id, "Bootstrapping");

        let health = match self.sync.load(user_id).await? {
            Some(snapshot) => snapshot,
            None => {
                info!(user_id = %user_id, "New account, writing defaults");
                let snapshot = HealthSnapshot::default();
                if let Err(err) = self.sync.sync_full(user_id, &snapshot).await {
                    self.tracker.record_error("initialize", &err);
                }
                snapshot
            }
        };

        let progression = match self.sync.load_gamification(user_id).await? {
            Some(state) => state,
            None => {
                info!(user_id = %user_id, "No gamification data, writing defaults");
                let state = ProgressionState::default();
                if let Err(err) = self
                    .sync
                    .sync_gamification(user_id, GamificationPatch::full(&state))
                    .await
                {
                    self.tracker.record_error("initialize", &err);
                }
                state
            }
        };

        *self.state.lock() = LocalState {
            health,
            progression,
        };
        self.seed_cache(user_id);

        let session = self.start_session(user_id)?;
        *self.session.lock() = Some(session);

        self.on_foreground().await?;
        Ok(())
    }

    /// Stop watching and forget the local state.
    pub fn sign_out(&self) {
        if let Some(session) = self.session.lock().take() {
            info!(user_id = %session.user_id, "Signing out");
        }
        *self.state.lock() = LocalState::default();
    }

    fn start_session(&self, user_id: &str) -> EngineResult<Session> {
        // Subscribe before watching so the first pushes are not missed.
        let changes = self.reconciler.subscribe();
        let applier = tokio::spawn(apply_remote_changes(
            changes,
            Arc::clone(&self.state),
            user_id.to_string(),
        ));

        let store = self.sync.store();
        let watches = WATCHED
            .into_iter()
            .map(|domain| self.reconciler.watch(store.as_ref(), domain, user_id))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Session {
            user_id: user_id.to_string(),
            _watches: watches,
            applier,
        })
    }

    /// Record the current local documents as the reconciler's baseline.
    fn seed_cache(&self, user_id: &str) {
        self.remember(user_id, &WATCHED);
    }

    /// Record `domains` as locally written in the reconciler's cache.
    pub(crate) fn remember(&self, user_id: &str, domains: &[Domain]) {
        let cache = self.reconciler.cache();
        let state = self.state.lock();
        for &domain in domains {
            match state.document(domain) {
                Ok(Some(doc)) => cache.record_local(&domain.key(user_id), doc),
                Ok(None) => {}
                Err(err) => warn!(domain = %domain, error = %err, "Cannot encode local document"),
            }
        }
    }

    /// Queue `updates` and wait for all of them to land.
    pub(crate) async fn push(
        &self,
        context: &'static str,
        user_id: &str,
        updates: Vec<DomainUpdate>,
    ) -> EngineResult<()> {
        let domains: Vec<Domain> = updates.iter().map(DomainUpdate::domain).collect();
        self.remember(user_id, &domains);

        match self.sync.sync_partial(user_id, updates).await {
            Ok(()) => {
                self.tracker.record_success(self.clock.now());
                Ok(())
            }
            Err(err) => {
                self.tracker.record_error(context, &err);
                Err(err.into())
            }
        }
    }

    /// Queue a gamification patch and wait for it to land.
    pub(crate) async fn push_progression(
        &self,
        context: &'static str,
        user_id: &str,
        patch: GamificationPatch,
    ) -> EngineResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        self.push(context, user_id, vec![DomainUpdate::Gamification(patch)])
            .await
    }

    /// Queue a gamification patch without waiting. Failures surface through
    /// [`sync_status`](Self::sync_status).
    pub(crate) fn push_progression_in_background(
        &self,
        context: &'static str,
        user_id: &str,
        patch: GamificationPatch,
    ) {
        if patch.is_empty() {
            return;
        }
        self.remember(user_id, &[Domain::Gamification]);

        match self.sync.enqueue(user_id, DomainUpdate::Gamification(patch)) {
            Ok(handle) => {
                let tracker = self.tracker.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle.await {
                        tracker.record_error(context, &err);
                    }
                });
            }
            Err(err) => self.tracker.record_error(context, &err),
        }
    }

    /// Run `action` under the quota for `metric` on the current plan.
    pub(crate) async fn guarded<T, F, Fut>(
        &self,
        user_id: &str,
        metric: QuotaMetric,
        action: F,
    ) -> EngineResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        Ok(self
            .quota
            .guarded(user_id, self.plan(), metric, action)
            .await?)
    }

    pub fn user_id(&self) -> EngineResult<String> {
        self.session
            .lock()
            .as_ref()
            .map(|session| session.user_id.clone())
            .ok_or(EngineError::NotSignedIn)
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.lock().is_some()
    }

    pub fn plan(&self) -> Plan {
        *self.plan.read()
    }

    pub fn set_plan(&self, plan: Plan) {
        info!(plan = %plan, "Plan changed");
        *self.plan.write() = plan;
    }

    pub fn quota(&self) -> &QuotaGate {
        &self.quota
    }

    pub fn domain_sync(&self) -> &Arc<DomainSync> {
        &self.sync
    }

    /// Observe remote changes as they are applied to local state.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<AppliedChange> {
        self.reconciler.subscribe()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.state.lock().health.clone()
    }

    /// Gamification state with streak lapses evaluated for today.
    ///
    /// Lapses found here are not persisted; [`on_foreground`](Self::on_foreground)
    /// does that.
    pub fn progression(&self) -> ProgressionState {
        let today = self.clock.today();
        let mut progression = self.state.lock().progression.clone();
        progression.streaks = evaluate_lapses(&progression.streaks, today).0;
        progression
    }

    pub fn streaks(&self) -> Vec<Streak> {
        self.progression().streaks
    }

    pub fn total_points(&self) -> u32 {
        self.state.lock().progression.total_points
    }

    pub fn unlocked_achievements(&self) -> Vec<Achievement> {
        self.state
            .lock()
            .progression
            .unlocked_achievements()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn sync_status(&self) -> SyncStatus {
        let queue = self.sync.queue();
        self.tracker
            .snapshot(queue.pending_count(), queue.retained_keys())
    }

    pub fn dismiss_sync_error(&self) {
        self.tracker.dismiss();
    }

    /// Full resynchronization: resend every write held after a failure,
    /// then re-fetch all domains.
    ///
    /// Domains with writes still queued keep their local value.
    pub async fn retry_sync(&self) -> EngineResult<()> {
        let user_id = self.user_id()?;
        let handles = self.sync.queue().retry_all();
        info!(user_id = %user_id, retried = handles.len(), "Retrying sync");

        let results = join_all(handles).await;
        if let Some(err) = results.into_iter().find_map(Result::err) {
            self.tracker.record_error("retry_sync", &err);
            return Err(err.into());
        }

        if let Err(err) = self.refresh_user(&user_id).await {
            self.tracker.record_error("retry_sync", &err);
            return Err(err);
        }
        self.tracker.reset(self.clock.now());
        Ok(())
    }

    /// Re-fetch every domain into local state.
    pub async fn refresh(&self) -> EngineResult<()> {
        let user_id = self.user_id()?;
        self.refresh_user(&user_id).await
    }

    async fn refresh_user(&self, user_id: &str) -> EngineResult<()> {
        let health = self.sync.load(user_id).await?;
        let progression = self.sync.load_gamification(user_id).await?;

        let queue = self.sync.queue();
        let busy = |domain: Domain| {
            let status = queue.status(&domain.key(user_id));
            status.phase != KeyPhase::Idle || status.has_pending
        };

        {
            let mut state = self.state.lock();
            if let Some(health) = health {
                for update in health.updates() {
                    if busy(update.domain()) {
                        debug!(domain = %update.domain(), "Keeping local value with queued writes");
                        continue;
                    }
                    state.health.apply(update);
                }
            }
            if let Some(progression) = progression {
                if !busy(Domain::Gamification) {
                    state.progression = progression;
                }
            }
        }

        self.seed_cache(user_id);
        Ok(())
    }
}

impl Drop for WellnessEngine {
    fn drop(&mut self) {
        self.session.lock().take();
    }
}

async fn apply_remote_changes(
    mut changes: broadcast::Receiver<AppliedChange>,
    state: Arc<Mutex<LocalState>>,
    user_id: String,
) {
    loop {
        match changes.recv().await {
            Ok(change) if change.user_id != user_id => {}
            Ok(AppliedChange {
                domain, data: None, ..
            }) => {
                debug!(domain = %domain, "Remote document removed, keeping local copy");
            }
            Ok(AppliedChange {
                domain,
                data: Some(doc),
                ..
            }) => {
                if let Err(err) = state.lock().apply_document(domain, doc) {
                    warn!(domain = %domain, error = %err, "Ignoring malformed remote document");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed remote changes");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
