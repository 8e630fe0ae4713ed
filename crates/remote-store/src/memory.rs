//! In-memory [`RemoteStore`] used by tests and offline embedding.

use crate::{
    merge_documents, Document, RemotePush, RemoteStore, StoreError, StoreResult, Subscription,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

type DocKey = (String, String);

/// Kind of write applied to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Set { merge: bool },
    Update,
}

/// A successful write, as recorded in the write log.
#[derive(Debug, Clone)]
pub struct WriteRecord {
    pub collection: String,
    pub id: String,
    pub op: WriteOp,
    /// The payload as sent by the caller (before merging).
    pub data: Document,
    /// When the write started.
    pub started_at: Instant,
    /// When the write was applied.
    pub applied_at: Instant,
}

#[derive(Default)]
struct State {
    docs: HashMap<DocKey, Document>,
    subscribers: HashMap<DocKey, Vec<mpsc::UnboundedSender<RemotePush>>>,
    write_log: Vec<WriteRecord>,
    write_attempts: usize,
    injected_write_failures: VecDeque<StoreError>,
    injected_read_failures: VecDeque<StoreError>,
    in_flight: HashMap<DocKey, usize>,
    max_in_flight: HashMap<DocKey, usize>,
}

/// Process-local document store.
///
/// Besides being a working store it is instrumented for tests: every write
/// is logged, concurrent writes to one document are counted, and failures
/// can be queued up for the next writes or reads.
pub struct InMemoryStore {
    state: Mutex<State>,
    write_latency: Mutex<Duration>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            write_latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Every write takes `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        *self.write_latency.lock().expect("lock poisoned") = latency;
    }

    /// The next `count` writes fail with `error`.
    pub fn fail_next_writes(&self, count: usize, error: StoreError) {
        let mut state = self.state.lock().expect("lock poisoned");
        for _ in 0..count {
            state.injected_write_failures.push_back(error.clone());
        }
    }

    /// The next `count` reads fail with `error`.
    pub fn fail_next_reads(&self, count: usize, error: StoreError) {
        let mut state = self.state.lock().expect("lock poisoned");
        for _ in 0..count {
            state.injected_read_failures.push_back(error.clone());
        }
    }

    /// Seed or replace a document without touching the write log, and push
    /// it to subscribers. Simulates a write from another device.
    pub fn put_remote(&self, collection: &str, id: &str, data: Document) {
        let key = (collection.to_string(), id.to_string());
        let mut state = self.state.lock().expect("lock poisoned");
        state.docs.insert(key.clone(), data.clone());
        notify(&mut state, &key, Some(data));
    }

    /// Remove a document and push the deletion to subscribers.
    pub fn delete_remote(&self, collection: &str, id: &str) {
        let key = (collection.to_string(), id.to_string());
        let mut state = self.state.lock().expect("lock poisoned");
        state.docs.remove(&key);
        notify(&mut state, &key, None);
    }

    /// Current content of a document, bypassing failure injection.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        let state = self.state.lock().expect("lock poisoned");
        state
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    /// All successful writes so far, in order of application.
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.state.lock().expect("lock poisoned").write_log.clone()
    }

    /// Successful writes to one document.
    pub fn writes_to(&self, collection: &str, id: &str) -> Vec<WriteRecord> {
        self.write_log()
            .into_iter()
            .filter(|w| w.collection == collection && w.id == id)
            .collect()
    }

    /// Number of write calls, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.state.lock().expect("lock poisoned").write_attempts
    }

    /// Highest number of writes ever in flight at once for one document.
    pub fn max_concurrent_writes(&self, collection: &str, id: &str) -> usize {
        let state = self.state.lock().expect("lock poisoned");
        state
            .max_in_flight
            .get(&(collection.to_string(), id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of live subscribers on a document.
    pub fn subscriber_count(&self, collection: &str, id: &str) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        let key = (collection.to_string(), id.to_string());
        match state.subscribers.get_mut(&key) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    async fn write(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        op: WriteOp,
    ) -> StoreResult<()> {
        let key = (collection.to_string(), id.to_string());
        let started_at = Instant::now();

        {
            let mut state = self.state.lock().expect("lock poisoned");
            state.write_attempts += 1;
            let in_flight = state.in_flight.entry(key.clone()).or_insert(0);
            *in_flight += 1;
            let current = *in_flight;
            let max = state.max_in_flight.entry(key.clone()).or_insert(0);
            *max = (*max).max(current);
        }

        let latency = *self.write_latency.lock().expect("lock poisoned");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(count) = state.in_flight.get_mut(&key) {
            *count = count.saturating_sub(1);
        }

        if let Some(err) = state.injected_write_failures.pop_front() {
            debug!(collection, id, error = %err, "Injected write failure");
            return Err(err);
        }

        let merged = match op {
            WriteOp::Set { merge: false } => data.clone(),
            WriteOp::Set { merge: true } => {
                let mut base = state.docs.get(&key).cloned().unwrap_or_default();
                merge_documents(&mut base, data.clone());
                base
            }
            WriteOp::Update => {
                let Some(mut base) = state.docs.get(&key).cloned() else {
                    return Err(StoreError::NotFound(format!("{collection}/{id}")));
                };
                for (field, value) in data.clone() {
                    base.insert(field, value);
                }
                base
            }
        };

        state.docs.insert(key.clone(), merged.clone());
        state.write_log.push(WriteRecord {
            collection: collection.to_string(),
            id: id.to_string(),
            op,
            data,
            started_at,
            applied_at: Instant::now(),
        });
        notify(&mut state, &key, Some(merged));
        Ok(())
    }
}

fn notify(state: &mut State, key: &DocKey, data: Option<Document>) {
    if let Some(senders) = state.subscribers.get_mut(key) {
        let push = RemotePush {
            collection: key.0.clone(),
            id: key.1.clone(),
            data,
        };
        senders.retain(|tx| tx.send(push.clone()).is_ok());
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let mut state = self.state.lock().expect("lock poisoned");
        if let Some(err) = state.injected_read_failures.pop_front() {
            return Err(err);
        }
        Ok(state
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        merge: bool,
    ) -> StoreResult<()> {
        self.write(collection, id, data, WriteOp::Set { merge }).await
    }

    async fn update(&self, collection: &str, id: &str, partial: Document) -> StoreResult<()> {
        self.write(collection, id, partial, WriteOp::Update).await
    }

    fn subscribe(&self, collection: &str, id: &str) -> StoreResult<Subscription> {
        let key = (collection.to_string(), id.to_string());
        let (tx, subscription) = Subscription::channel();
        let mut state = self.state.lock().expect("lock poisoned");
        // Initial snapshot, like a fresh listener on a real backend.
        let _ = tx.send(RemotePush {
            collection: collection.to_string(),
            id: id.to_string(),
            data: state.docs.get(&key).cloned(),
        });
        state.subscribers.entry(key).or_default().push(tx);
        Ok(subscription)
    }
}
