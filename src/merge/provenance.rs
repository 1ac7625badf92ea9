//! Per-field and per-merge provenance, recording which source won each
//! field and under what strategy, so merges are reversible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolutionKind {
    Auto,
    Deferred,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceValue {
    pub record_id: String,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub source_record_id: Option<String>,
    pub strategy_applied: String,
    pub all_values: Vec<SourceValue>,
    pub had_conflict: bool,
    pub conflict_resolution: Option<ConflictResolutionKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConflict {
    pub field: String,
    pub values: Vec<SourceValue>,
    pub resolution: ConflictResolutionKind,
    pub resolved_value: Option<JsonValue>,
    pub resolution_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub golden_record_id: String,
    pub source_record_ids: Vec<String>,
    pub merged_at: DateTime<Utc>,
    pub merged_by: Option<String>,
    pub queue_item_id: Option<String>,
    pub field_sources: std::collections::BTreeMap<String, FieldProvenance>,
    pub unmerged: bool,
    pub unmerged_at: Option<DateTime<Utc>>,
    pub unmerged_by: Option<String>,
    pub unmerge_reason: Option<String>,
}

impl Provenance {
    /// Invariant check: every id referenced by a field's `all_values`
    /// must appear in `source_record_ids`.
    pub fn is_consistent(&self) -> bool {
        self.field_sources.values().all(|fp| {
            fp.all_values
                .iter()
                .all(|v| self.source_record_ids.contains(&v.record_id))
        })
    }
}
