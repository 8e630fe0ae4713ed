//! # Wellness Engine
//!
//! The object an app holds for the signed-in user. It owns the local state
//! and wires the sync pieces together:
//!
//! ```text
//! operation ──▶ LocalState (sync) ──▶ DomainSync ──▶ MutationQueue ──▶ RemoteStore
//!                     ▲                                                    │
//!                     └──── SnapshotReconciler ◀──── subscriptions ◀───────┘
//! ```
//!
//! Quota-metered operations run through [`quota_gate::QuotaGate`]: the
//! check happens first, the local change and its write only when allowed,
//! and the usage counter is bumped after the write lands.
//!
//! Streak lapses are evaluated lazily, in [`WellnessEngine::on_foreground`]
//! and whenever progression is read. Nothing expires on a timer, so a
//! persisted streak can look alive until one of those runs.

mod config;
mod engine;
mod error;
mod health;
mod progress;
mod state;
mod status;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use engine::WellnessEngine;
pub use error::{EngineError, EngineResult};
pub use state::LocalState;
pub use status::SyncStatus;

pub(crate) use status::SyncTracker;
