//! Raw datasets as received from the facility source.

use std::sync::Arc;

/// One raw record: an open key/value object with source-specific field names
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A named, immutable sequence of raw records.
///
/// Refetching produces a new `Dataset`; the records are never mutated in place.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub key: String,
    pub records: Arc<Vec<RawRecord>>,
}

impl Dataset {
    pub fn new(key: &str, records: Vec<RawRecord>) -> Self {
        Self {
            key: key.to_string(),
            records: Arc::new(records),
        }
    }

    /// A dataset that contributes no points (source unavailable)
    pub fn empty(key: &str) -> Self {
        Self::new(key, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
