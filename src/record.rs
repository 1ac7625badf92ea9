//! The record data model: a tree of scalars/arrays/maps addressed by
//! dot-separated field paths. The engine never mutates a record in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A single field value. Records are trees of these; there are no cycles.
pub type FieldValue = JsonValue;

/// A mapping from field path to value. Construction and lookup both
/// understand dot-separated paths (`address.city`) transparently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Fetch a (possibly nested) field by dot path, e.g. `"address.city"`.
    pub fn get(&self, path: &str) -> Option<&FieldValue> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.fields.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a (possibly nested) field by dot path, creating intermediate
    /// maps as needed. Returns an error string if an ancestor path was
    /// already bound to a scalar (structural conflict).
    pub fn set(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        let segments: Vec<&str> = path.split('.').collect();
        let (first, rest) = segments.split_first().expect("path has at least one segment");
        if rest.is_empty() {
            self.fields.insert((*first).to_string(), value);
            return Ok(());
        }

        let slot = self
            .fields
            .entry((*first).to_string())
            .or_insert_with(|| JsonValue::Object(Default::default()));
        set_nested(slot, rest, value, first)
    }

    /// All leaf field paths present in this record (dot-joined), in
    /// BTreeMap (lexicographic) order. Nested maps are recursed into;
    /// arrays are treated as leaves.
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (key, value) in &self.fields {
            collect_paths(key.clone(), value, &mut paths);
        }
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn set_nested(
    slot: &mut FieldValue,
    rest: &[&str],
    value: FieldValue,
    ancestor_name: &str,
) -> Result<(), String> {
    let obj = slot.as_object_mut().ok_or_else(|| {
        format!("cannot write nested path under '{ancestor_name}': already bound to a scalar")
    })?;
    let (next, tail) = rest.split_first().expect("rest is non-empty");
    if tail.is_empty() {
        obj.insert((*next).to_string(), value);
        return Ok(());
    }
    let child = obj
        .entry((*next).to_string())
        .or_insert_with(|| JsonValue::Object(Default::default()));
    set_nested(child, tail, value, next)
}

fn collect_paths(prefix: String, value: &FieldValue, out: &mut Vec<String>) {
    match value {
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_paths(format!("{prefix}.{key}"), child, out);
            }
        }
        _ => out.push(prefix),
    }
}

/// Input to the merge executor: one contributing record plus the
/// bookkeeping the merge strategies need (timestamps, opaque id).
///
/// Invariants: `created_at <= updated_at`; `id` is distinct across the
/// source-record set passed to a single merge call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub record: Record,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, record: Record, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            record,
            created_at,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_get_set_roundtrip() {
        let mut record = Record::new();
        record.set("address.city", FieldValue::from("Austin")).unwrap();
        record.set("address.zip", FieldValue::from("78249")).unwrap();
        record.set("name", FieldValue::from("John")).unwrap();

        assert_eq!(record.get("address.city").unwrap(), "Austin");
        assert_eq!(record.get("address.zip").unwrap(), "78249");
        assert_eq!(record.get("name").unwrap(), "John");
        assert!(record.get("address.country").is_none());
    }

    #[test]
    fn set_scalar_then_nested_is_structural_error() {
        let mut record = Record::new();
        record.set("a", FieldValue::from("scalar")).unwrap();
        let err = record.set("a.b", FieldValue::from(1)).unwrap_err();
        assert!(err.contains("already bound to a scalar"));
    }

    #[test]
    fn field_paths_recurses_nested_maps() {
        let mut record = Record::new();
        record.set("address.city", FieldValue::from("Austin")).unwrap();
        record.set("address.zip", FieldValue::from("78249")).unwrap();
        record.set("name", FieldValue::from("John")).unwrap();

        let mut paths = record.field_paths();
        paths.sort();
        assert_eq!(paths, vec!["address.city", "address.zip", "name"]);
    }
}
