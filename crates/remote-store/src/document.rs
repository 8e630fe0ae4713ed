//! Document helpers.

use serde_json::{Map, Value};

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// Field stamped on every write by the domain sync layer.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Deep-merge `patch` into `base`.
///
/// Nested objects are merged key by key; any other value in `patch`
/// (including arrays) replaces the value in `base`.
pub fn merge_documents(base: &mut Document, patch: Document) {
    for (key, incoming) in patch {
        match (base.get_mut(&key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_documents(existing, nested);
            }
            (_, incoming) => {
                base.insert(key, incoming);
            }
        }
    }
}

/// Set the `updatedAt` field to `timestamp` (RFC 3339).
pub fn stamp_updated_at(doc: &mut Document, timestamp: impl Into<String>) {
    doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(timestamp.into()));
}
