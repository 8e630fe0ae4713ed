//! # Mutation Queue
//!
//! Delivers the latest payload per key to the remote store, one write at a
//! time, with debounce and bounded retry.
//!
//! Each key runs a small state machine:
//!
//! ```text
//!          enqueue(debounce)          timer fires
//!   Idle ─────────────────▶ Scheduled ───────────▶ InFlight
//!    ▲  └──────── enqueue(immediate / priority) ──────▶ │
//!    │                                                  │
//!    └──────────── settled, nothing pending ────────────┘
//! ```
//!
//! - Enqueues to a `Scheduled` key replace (or merge into) the pending
//!   payload and restart the debounce timer.
//! - Enqueues to an `InFlight` key wait as the next payload; the running
//!   write is never interrupted.
//! - Transient failures are retried with exponential backoff. When the
//!   attempts run out the waiting callers are rejected and the payload is
//!   retained, so the next enqueue or an explicit [`MutationQueue::retry`]
//!   carries it forward.
//!
//! [`MutationQueue::enqueue`] registers synchronously and returns a
//! [`MutationHandle`] that resolves when a write carrying that payload has
//! landed.

mod backoff;
mod config;
mod error;
mod handle;
mod queue;

pub use backoff::compute_backoff;
pub use config::QueueConfig;
pub use error::{MutationError, MutationResult};
pub use handle::MutationHandle;
pub use queue::{EnqueueOptions, KeyPhase, KeyStatus, MergeFn, MutationQueue};

use async_trait::async_trait;
use remote_store::StoreError;
use tokio::time::Instant;

/// Performs the actual write for a key.
#[async_trait]
pub trait MutationWriter: Send + Sync + 'static {
    type Payload: Clone + Send + Sync + 'static;

    async fn write(&self, key: &str, payload: Self::Payload) -> Result<(), StoreError>;
}

/// Read access to when a key was last written locally.
///
/// The snapshot reconciler uses this to recognise echoes of our own writes.
pub trait LocalWriteClock: Send + Sync {
    fn last_local_write_at(&self, key: &str) -> Option<Instant>;
}
