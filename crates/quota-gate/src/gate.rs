//! Quota checks around metered actions.

use crate::{Plan, QuotaError, QuotaLimit, QuotaMetric, QuotaResult, QuotaTable, QuotaUsage};
use domain_sync::{Domain, DomainSync, DomainUpdate};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use sync_config_and_utils::Clock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCheck {
    pub metric: QuotaMetric,
    pub allowed: bool,
    pub used: u32,
    pub limit: QuotaLimit,
    /// Usage could not be read; `allowed` is false regardless of the limit.
    pub usage_unavailable: bool,
}

/// Enforces [`QuotaTable`] limits against the user's usage document.
pub struct QuotaGate {
    sync: Arc<DomainSync>,
    clock: Arc<dyn Clock>,
    table: QuotaTable,
    /// Serializes read-modify-write of usage documents in this process.
    increments: Mutex<()>,
    /// One lock per `(user, metric)`, held from check to increment.
    guards: Mutex<HashMap<(String, QuotaMetric), Arc<Mutex<()>>>>,
}

impl QuotaGate {
    pub fn new(sync: Arc<DomainSync>, clock: Arc<dyn Clock>, table: QuotaTable) -> Self {
        Self {
            sync,
            clock,
            table,
            increments: Mutex::new(()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn table(&self) -> &QuotaTable {
        &self.table
    }

    /// Current usage document, or `None` when the user has none yet.
    pub async fn usage(&self, user_id: &str) -> QuotaResult<Option<QuotaUsage>> {
        let Some(doc) = self.sync.read(Domain::QuotaUsage, user_id).await? else {
            return Ok(None);
        };
        let usage = QuotaUsage::from_document(doc).map_err(domain_sync::DomainError::from)?;
        Ok(Some(usage))
    }

    /// Whether `user_id` on `plan` may perform one more `metric` action.
    ///
    /// A missing usage document is created with zeroed counters. Read
    /// failures deny, even on unlimited plans.
    pub async fn check_quota(&self, user_id: &str, plan: Plan, metric: QuotaMetric) -> QuotaCheck {
        let limit = self.table.limit(plan, metric);
        let today = self.clock.today();

        let used = match self.usage(user_id).await {
            Ok(Some(usage)) => usage.used(metric, today),
            Ok(None) => {
                self.initialize(user_id).await;
                0
            }
            Err(err) => {
                warn!(user_id = %user_id, metric = %metric, error = %err, "Quota usage unreadable, denying");
                return QuotaCheck {
                    metric,
                    allowed: false,
                    used: 0,
                    limit,
                    usage_unavailable: true,
                };
            }
        };

        let allowed = limit.allows(used);
        debug!(user_id = %user_id, plan = %plan, metric = %metric, used, limit = %limit, allowed, "Quota check");
        QuotaCheck {
            metric,
            allowed,
            used,
            limit,
            usage_unavailable: false,
        }
    }

    /// Record one use of `metric`. Returns the new count for the period.
    pub async fn increment_quota(&self, user_id: &str, metric: QuotaMetric) -> QuotaResult<u32> {
        let _guard = self.increments.lock().await;
        let today = self.clock.today();

        let mut usage = self
            .usage(user_id)
            .await?
            .unwrap_or_else(|| QuotaUsage::new(user_id, today));
        usage.user_id = user_id.to_string();
        let count = usage.increment(metric, today);

        let doc = usage.to_document().map_err(domain_sync::DomainError::from)?;
        self.sync
            .enqueue(user_id, DomainUpdate::QuotaUsage(doc))?
            .await
            .map_err(domain_sync::DomainError::from)?;

        debug!(user_id = %user_id, metric = %metric, count, "Quota incremented");
        Ok(count)
    }

    /// Run `action` only if the quota allows it, then count it.
    ///
    /// A denied check returns before `action` is called. The counter is
    /// bumped only after `action` succeeds; a failed increment is logged
    /// and the action's result is still returned.
    ///
    /// Guarded calls for the same user and metric run one at a time in this
    /// process, so concurrent callers cannot pass the same check. Other
    /// devices are not coordinated with.
    pub async fn guarded<T, E, F, Fut>(
        &self,
        user_id: &str,
        plan: Plan,
        metric: QuotaMetric,
        action: F,
    ) -> Result<T, QuotaError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _guard = self.guard(user_id, metric).await;
        let check = self.check_quota(user_id, plan, metric).await;
        if check.usage_unavailable {
            return Err(QuotaError::Unavailable { metric });
        }
        if !check.allowed {
            info!(user_id = %user_id, metric = %metric, limit = %check.limit, "Quota exceeded");
            return Err(QuotaError::Exceeded {
                limit: check.limit,
                metric,
            });
        }

        let value = action().await.map_err(QuotaError::Action)?;

        if let Err(err) = self.increment_quota(user_id, metric).await {
            warn!(user_id = %user_id, metric = %metric, error = %err, "Failed to record quota usage");
        }
        Ok(value)
    }

    async fn guard(&self, user_id: &str, metric: QuotaMetric) -> OwnedMutexGuard<()> {
        let lock = {
            let mut guards = self.guards.lock().await;
            Arc::clone(
                guards
                    .entry((user_id.to_string(), metric))
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    async fn initialize(&self, user_id: &str) {
        let usage = QuotaUsage::new(user_id, self.clock.today());
        let written = match usage.to_document() {
            Ok(doc) => match self.sync.enqueue(user_id, DomainUpdate::QuotaUsage(doc)) {
                Ok(handle) => handle.await.map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            },
            Err(err) => Err(err.to_string()),
        };
        if let Err(error) = written {
            warn!(user_id = %user_id, error = %error, "Failed to initialize quota usage");
        }
    }
}
