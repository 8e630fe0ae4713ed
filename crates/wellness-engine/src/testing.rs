//! Shared fixtures for engine tests.

use crate::{EngineConfig, WellnessEngine};
use chrono::NaiveDate;
use remote_store::{Document, InMemoryStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use sync_config_and_utils::FixedClock;

pub(crate) struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub engine: WellnessEngine,
}

pub(crate) fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub(crate) fn harness() -> Harness {
    harness_with(InMemoryStore::new(), EngineConfig::default())
}

pub(crate) fn harness_with(store: InMemoryStore, config: EngineConfig) -> Harness {
    let store = Arc::new(store);
    let clock = Arc::new(FixedClock::on_day(day("2024-01-05")));
    let engine = WellnessEngine::new(store.clone(), clock.clone(), config);
    Harness {
        store,
        clock,
        engine,
    }
}

pub(crate) async fn signed_in() -> Harness {
    let h = harness();
    h.engine.bootstrap("u1").await.unwrap();
    h
}

pub(crate) fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// Let spawned watch and applier tasks run.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
