//! Flat field maps sent to the collector.

use serde::Serialize;
use serde_json::{Map, Value};

/// One metric's export fields: field name to scalar value.
///
/// Serialized as a JSON object with keys in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExportRecord(Map<String, Value>);

impl ExportRecord {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing any earlier value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Value at `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every field of `other` into `self`; `other` wins on collisions.
    pub fn merge(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Field names, in key order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for ExportRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overwrites_shared_fields() {
        let mut first = ExportRecord::new();
        first.insert("hostName", "10.0.0.1");
        first.insert("requests", 1);
        let mut second = ExportRecord::new();
        second.insert("hostName", "10.0.0.1");
        second.insert("requests", 7);
        second.insert("errors", 2);

        first.merge(second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.get("requests"), Some(&json!(7)));
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut record = ExportRecord::new();
        record.insert("id", "api");
        record.insert("latency_avg", 0.5);
        let encoded = serde_json::to_string(&record).expect("encode");
        assert_eq!(encoded, r#"{"id":"api","latency_avg":0.5}"#);
    }
}
