//! Keyed queue and its per-key state machine.

use crate::{
    compute_backoff, LocalWriteClock, MutationError, MutationHandle, MutationResult,
    MutationWriter, QueueConfig,
};
use remote_store::StoreError;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Folds a newer payload into an older one: `merge(older, newer)`.
pub type MergeFn<P> = Arc<dyn Fn(P, P) -> P + Send + Sync>;

type Waiter = oneshot::Sender<MutationResult<()>>;

/// Per-call enqueue behavior.
pub struct EnqueueOptions<P> {
    /// Wait for the debounce window before dispatching.
    pub debounce: bool,
    /// Skip the debounce window. Still waits for an in-flight write.
    pub priority: bool,
    /// Merge into an unsent payload instead of replacing it.
    pub merge: Option<MergeFn<P>>,
}

impl<P> Default for EnqueueOptions<P> {
    fn default() -> Self {
        Self {
            debounce: true,
            priority: false,
            merge: None,
        }
    }
}

impl<P> Clone for EnqueueOptions<P> {
    fn clone(&self) -> Self {
        Self {
            debounce: self.debounce,
            priority: self.priority,
            merge: self.merge.clone(),
        }
    }
}

impl<P> fmt::Debug for EnqueueOptions<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueOptions")
            .field("debounce", &self.debounce)
            .field("priority", &self.priority)
            .field("merge", &self.merge.is_some())
            .finish()
    }
}

impl<P> EnqueueOptions<P> {
    pub fn debounced() -> Self {
        Self::default()
    }

    pub fn immediate() -> Self {
        Self {
            debounce: false,
            ..Self::default()
        }
    }

    pub fn priority() -> Self {
        Self {
            debounce: false,
            priority: true,
            merge: None,
        }
    }

    pub fn with_merge(mut self, merge: impl Fn(P, P) -> P + Send + Sync + 'static) -> Self {
        self.merge = Some(Arc::new(merge));
        self
    }

    fn is_immediate(&self) -> bool {
        self.priority || !self.debounce
    }
}

/// Where a key is in its write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    Idle,
    Scheduled,
    InFlight,
}

/// Snapshot of one key's queue state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub phase: KeyPhase,
    /// An unsent payload is waiting (debounce, behind a flight, or retained).
    pub has_pending: bool,
    /// The pending payload is left over from a failed cycle and will only
    /// be sent by the next enqueue or a manual retry.
    pub retained: bool,
    pub last_local_write_at: Option<Instant>,
}

struct KeyState<P> {
    phase: KeyPhase,
    pending: Option<P>,
    waiters: Vec<Waiter>,
    pending_debounced: bool,
    merge: Option<MergeFn<P>>,
    retained: bool,
    timer_generation: u64,
    last_local_write_at: Option<Instant>,
}

impl<P> KeyState<P> {
    fn new() -> Self {
        Self {
            phase: KeyPhase::Idle,
            pending: None,
            waiters: Vec::new(),
            pending_debounced: false,
            merge: None,
            retained: false,
            timer_generation: 0,
            last_local_write_at: None,
        }
    }

    fn status(&self) -> KeyStatus {
        KeyStatus {
            phase: self.phase,
            has_pending: self.pending.is_some(),
            retained: self.retained,
            last_local_write_at: self.last_local_write_at,
        }
    }
}

struct Inner<W: MutationWriter> {
    writer: Arc<W>,
    config: QueueConfig,
    keys: Mutex<HashMap<String, KeyState<W::Payload>>>,
}

/// Per-key debounced, coalescing, single-flight write queue.
///
/// Must be used from within a tokio runtime: timers and writes run on
/// spawned tasks. Cloning is cheap and shares the same queue.
pub struct MutationQueue<W: MutationWriter> {
    inner: Arc<Inner<W>>,
}

impl<W: MutationWriter> Clone for MutationQueue<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: MutationWriter> MutationQueue<W> {
    pub fn new(writer: Arc<W>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                writer,
                config,
                keys: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn writer(&self) -> &Arc<W> {
        &self.inner.writer
    }

    /// Queue `payload` as the newest value for `key`.
    ///
    /// Registration happens before this returns, so coalescing depends only
    /// on call order. The handle resolves when a write carrying this payload
    /// (possibly merged with, or replaced by, later ones) has landed.
    pub fn enqueue(
        &self,
        key: impl Into<String>,
        payload: W::Payload,
        options: EnqueueOptions<W::Payload>,
    ) -> MutationHandle {
        let key = key.into();
        let (tx, rx) = oneshot::channel();

        let mut keys = self.inner.keys.lock().expect("lock poisoned");
        let state = keys.entry(key.clone()).or_insert_with(KeyState::new);

        state.last_local_write_at = Some(Instant::now());
        if options.merge.is_some() {
            state.merge = options.merge.clone();
        }

        let immediate = options.is_immediate();
        state.pending = Some(match (state.pending.take(), &options.merge) {
            (Some(older), Some(merge)) => {
                state.pending_debounced &= !immediate;
                merge(older, payload)
            }
            (Some(_), None) => {
                state.pending_debounced &= !immediate;
                payload
            }
            (None, _) => {
                state.pending_debounced = !immediate;
                payload
            }
        });
        if state.retained {
            debug!(key = %key, "Folding new payload into retained write");
            state.retained = false;
        }
        state.waiters.push(tx);

        match state.phase {
            KeyPhase::InFlight => {
                debug!(key = %key, waiters = state.waiters.len(), "Queued behind in-flight write");
            }
            _ if immediate => self.inner.dispatch(&key, state),
            _ => self.inner.schedule(&key, state),
        }

        MutationHandle::new(rx)
    }

    /// Re-send the payload retained after a failed cycle.
    ///
    /// Returns `None` when `key` has nothing retained or is busy.
    pub fn retry(&self, key: &str) -> Option<MutationHandle> {
        let mut keys = self.inner.keys.lock().expect("lock poisoned");
        let state = keys.get_mut(key)?;
        if !state.retained || state.phase != KeyPhase::Idle {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        info!(key = %key, "Retrying retained write");
        self.inner.dispatch(key, state);
        Some(MutationHandle::new(rx))
    }

    /// [`retry`](Self::retry) every key holding a retained payload.
    pub fn retry_all(&self) -> Vec<MutationHandle> {
        self.retained_keys()
            .iter()
            .filter_map(|key| self.retry(key))
            .collect()
    }

    /// Keys whose last cycle failed and whose payload is still unsent.
    pub fn retained_keys(&self) -> Vec<String> {
        let keys = self.inner.keys.lock().expect("lock poisoned");
        let mut retained: Vec<String> = keys
            .iter()
            .filter(|(_, state)| state.retained)
            .map(|(key, _)| key.clone())
            .collect();
        retained.sort();
        retained
    }

    pub fn status(&self, key: &str) -> KeyStatus {
        let keys = self.inner.keys.lock().expect("lock poisoned");
        keys.get(key)
            .map(KeyState::status)
            .unwrap_or_else(|| KeyState::<W::Payload>::new().status())
    }

    /// Keys that are scheduled, in flight, or holding an unsent payload.
    pub fn pending_count(&self) -> usize {
        let keys = self.inner.keys.lock().expect("lock poisoned");
        keys.values()
            .filter(|state| state.phase != KeyPhase::Idle || state.pending.is_some())
            .count()
    }
}

impl<W: MutationWriter> LocalWriteClock for MutationQueue<W> {
    fn last_local_write_at(&self, key: &str) -> Option<Instant> {
        let keys = self.inner.keys.lock().expect("lock poisoned");
        keys.get(key).and_then(|state| state.last_local_write_at)
    }
}

impl<W: MutationWriter> Inner<W> {
    /// Arm (or re-arm) the debounce timer. Older timers see a stale
    /// generation and do nothing.
    fn schedule(self: &Arc<Self>, key: &str, state: &mut KeyState<W::Payload>) {
        state.phase = KeyPhase::Scheduled;
        state.timer_generation += 1;
        let generation = state.timer_generation;

        let inner = Arc::clone(self);
        let key = key.to_string();
        let delay = self.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.on_timer(&key, generation);
        });
    }

    fn on_timer(self: &Arc<Self>, key: &str, generation: u64) {
        let mut keys = self.keys.lock().expect("lock poisoned");
        let Some(state) = keys.get_mut(key) else {
            return;
        };
        if state.phase != KeyPhase::Scheduled || state.timer_generation != generation {
            return;
        }
        self.dispatch(key, state);
    }

    fn dispatch(self: &Arc<Self>, key: &str, state: &mut KeyState<W::Payload>) {
        let Some(payload) = state.pending.take() else {
            state.phase = KeyPhase::Idle;
            return;
        };
        let waiters = std::mem::take(&mut state.waiters);
        state.phase = KeyPhase::InFlight;
        state.timer_generation += 1;
        state.retained = false;
        state.last_local_write_at = Some(Instant::now());

        debug!(key = %key, waiters = waiters.len(), "Dispatching write");

        let inner = Arc::clone(self);
        let key = key.to_string();
        tokio::spawn(async move {
            let outcome = inner.run_flight(&key, &payload).await;
            inner.settle(&key, payload, waiters, outcome);
        });
    }

    async fn run_flight(&self, key: &str, payload: &W::Payload) -> Result<u32, (u32, StoreError)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.writer.write(key, payload.clone()).await {
                Ok(()) => return Ok(attempt),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = compute_backoff(attempt, &self.config);
                    warn!(
                        key = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err((attempt, err)),
            }
        }
    }

    fn settle(
        self: &Arc<Self>,
        key: &str,
        payload: W::Payload,
        waiters: Vec<Waiter>,
        outcome: Result<u32, (u32, StoreError)>,
    ) {
        let mut keys = self.keys.lock().expect("lock poisoned");
        let Some(state) = keys.get_mut(key) else {
            return;
        };
        state.phase = KeyPhase::Idle;
        state.last_local_write_at = Some(Instant::now());

        match outcome {
            Ok(attempts) => {
                debug!(key = %key, attempts, "Write settled");
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err((attempts, err)) => {
                let failure = MutationError::from_store(key, attempts, err);
                error!(key = %key, attempts, error = %failure, "Write failed");
                for waiter in waiters {
                    let _ = waiter.send(Err(failure.clone()));
                }

                // Keep the unwritten data: fold it under any newer payload,
                // or hold it until the next enqueue or manual retry.
                state.pending = Some(match (state.pending.take(), &state.merge) {
                    (Some(newer), Some(merge)) => merge(payload, newer),
                    (Some(newer), None) => newer,
                    (None, _) => {
                        state.retained = true;
                        payload
                    }
                });
            }
        }

        if state.pending.is_some() && !state.waiters.is_empty() {
            if state.pending_debounced {
                self.schedule(key, state);
            } else {
                self.dispatch(key, state);
            }
        }
    }
}
