//! # Snapshot Reconciler
//!
//! Merges remote pushes into the local cache without reverting local writes
//! that are still propagating.
//!
//! A push for key `k` that arrives within the quiet interval of the last
//! local write to `k` is treated as the echo of that write and discarded.
//! Anything later is applied and broadcast to observers. The rule only
//! filters what is received; it never delays an outgoing write.
//!
//! The check is time based and therefore inexact: a genuine remote change
//! landing inside the quiet window is dropped until the next push for that
//! document.

mod cache;
mod reconciler;

pub use cache::{CacheSource, CachedDocument, LocalCache};
pub use reconciler::{
    AppliedChange, ReconcileOutcome, RemoteSnapshotEvent, SnapshotReconciler, WatchHandle,
};
