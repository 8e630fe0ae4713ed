//! The queue payload and the writer that sends it to the store.

use crate::Domain;
use async_trait::async_trait;
use chrono::SecondsFormat;
use mutation_queue::MutationWriter;
use remote_store::{stamp_updated_at, Document, RemoteStore, StoreError};
use std::sync::Arc;
use sync_config_and_utils::Clock;
use tracing::debug;

/// One document write as carried through the mutation queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainWrite {
    pub domain: Domain,
    pub user_id: String,
    pub data: Document,
}

impl DomainWrite {
    /// Fold a newer write into this one. Top-level fields of `newer` win.
    pub fn merged_with(mut self, newer: DomainWrite) -> DomainWrite {
        for (field, value) in newer.data {
            self.data.insert(field, value);
        }
        self
    }
}

/// Sends [`DomainWrite`]s to the remote store, stamping `updatedAt`.
///
/// Gamification patches are merged into the stored document; every other
/// domain replaces it.
pub struct StoreWriter {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

#[async_trait]
impl MutationWriter for StoreWriter {
    type Payload = DomainWrite;

    async fn write(&self, key: &str, payload: DomainWrite) -> Result<(), StoreError> {
        let mut data = payload.data;
        let now = self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true);
        stamp_updated_at(&mut data, now);

        let merge = payload.domain.merges_on_write();
        debug!(key = %key, domain = %payload.domain, fields = data.len(), merge, "Writing document");
        self.store
            .set(payload.domain.collection(), &payload.user_id, data, merge)
            .await
    }
}
