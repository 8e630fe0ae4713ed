//! Last known document per key.

use parking_lot::RwLock;
use remote_store::{Document, UPDATED_AT_FIELD};
use std::collections::HashMap;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Written by this client.
    Local,
    /// Applied from a remote push.
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    /// `None` when the document is known not to exist.
    pub data: Option<Document>,
    pub applied_at: Instant,
    pub source: CacheSource,
}

/// Key -> last known document.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: RwLock<HashMap<String, CachedDocument>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<CachedDocument> {
        self.entries.read().get(key).cloned()
    }

    /// Record a document written by this client.
    pub fn record_local(&self, key: &str, data: Document) {
        self.insert(key, Some(data), CacheSource::Local);
    }

    pub(crate) fn apply_remote(&self, key: &str, data: Option<Document>) {
        self.insert(key, data, CacheSource::Remote);
    }

    /// Whether `data` matches what is cached, ignoring `updatedAt`.
    pub fn matches(&self, key: &str, data: Option<&Document>) -> bool {
        let entries = self.entries.read();
        let Some(cached) = entries.get(key) else {
            return false;
        };
        match (cached.data.as_ref(), data) {
            (None, None) => true,
            (Some(a), Some(b)) => same_content(a, b),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn insert(&self, key: &str, data: Option<Document>, source: CacheSource) {
        self.entries.write().insert(
            key.to_string(),
            CachedDocument {
                data,
                applied_at: Instant::now(),
                source,
            },
        );
    }
}

fn same_content(a: &Document, b: &Document) -> bool {
    let visible = |doc: &Document| doc.len() - usize::from(doc.contains_key(UPDATED_AT_FIELD));
    visible(a) == visible(b)
        && a
            .iter()
            .filter(|(field, _)| field.as_str() != UPDATED_AT_FIELD)
            .all(|(field, value)| b.get(field) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn matches_ignores_updated_at() {
        let cache = LocalCache::new();
        cache.record_local("healthMetrics-u1", doc(json!({"steps": 5})));

        assert!(cache.matches(
            "healthMetrics-u1",
            Some(&doc(json!({"steps": 5, "updatedAt": "2024-01-05T00:00:00.000Z"})))
        ));
        assert!(!cache.matches("healthMetrics-u1", Some(&doc(json!({"steps": 6})))));
        assert!(!cache.matches("healthMetrics-u1", None));
        assert!(!cache.matches("other", None));
    }

    #[tokio::test]
    async fn remote_apply_overwrites_local() {
        let cache = LocalCache::new();
        cache.record_local("k", doc(json!({"v": 1})));
        cache.apply_remote("k", None);

        let cached = cache.get("k").unwrap();
        assert_eq!(cached.source, CacheSource::Remote);
        assert_eq!(cached.data, None);
        assert!(cache.matches("k", None));
        assert_eq!(cache.len(), 1);
    }
}
