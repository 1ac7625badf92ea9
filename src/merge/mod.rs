//! Merge executor: resolves conflicting field values from N source
//! records into one golden record, under configurable per-field
//! strategies, with full field-level provenance.

pub mod provenance;
pub mod strategies;

use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{ErrorContext, ResolverError};
use crate::record::{Record, SourceRecord};
use crate::schema::Schema;

pub use provenance::{ConflictResolutionKind, FieldProvenance, MergeConflict, Provenance, SourceValue};
pub use strategies::{NullHandling, StrategyKind, StrategyOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Error,
    UseDefault,
    MarkConflict,
}

pub struct FieldStrategyOverride {
    pub field: String,
    pub strategy: StrategyKind,
    pub options: StrategyOptions,
}

pub struct MergeConfig {
    pub field_strategies: Vec<FieldStrategyOverride>,
    pub default_strategy: StrategyKind,
    pub default_options: StrategyOptions,
    pub track_provenance: bool,
    pub conflict_resolution: ConflictResolution,
}

impl MergeConfig {
    /// Numeric strategies on a non-numeric schema field are a
    /// configuration error, caught at build time.
    pub fn validate(&self, schema: &Schema) -> Result<(), ResolverError> {
        for over in &self.field_strategies {
            if over.strategy.is_numeric()
                && let Some(descriptor) = schema.get(&over.field)
                && !descriptor.field_type.is_numeric()
            {
                return Err(ResolverError::configuration(format!(
                    "field '{}' has numeric merge strategy '{}' but is not a numeric field",
                    over.field,
                    over.strategy.name()
                )));
            }
        }
        Ok(())
    }

    fn strategy_for(&self, field: &str) -> (&StrategyKind, &StrategyOptions) {
        self.field_strategies
            .iter()
            .find(|over| over.field == field)
            .map(|over| (&over.strategy, &over.options))
            .unwrap_or((&self.default_strategy, &self.default_options))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStats {
    pub source_count: usize,
    pub fields_merged: usize,
    pub conflicts_detected: usize,
}

pub struct MergeResult {
    pub golden_record: Record,
    pub golden_record_id: String,
    pub provenance: Option<Provenance>,
    pub conflicts: Vec<MergeConflict>,
    pub stats: MergeStats,
}

fn shallow_eq(a: &JsonValue, b: &JsonValue) -> bool {
    a == b
}

fn distinct_non_null_count(values: &[Option<JsonValue>]) -> usize {
    let mut seen: Vec<&JsonValue> = Vec::new();
    for v in values.iter().flatten() {
        if v.is_null() {
            continue;
        }
        if !seen.iter().any(|existing| shallow_eq(existing, v)) {
            seen.push(v);
        }
    }
    seen.len()
}

fn generate_golden_id(source_ids: &[String]) -> String {
    let mut sorted = source_ids.to_vec();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    format!("golden-{:x}", hasher.finish())
}

/// Merge `sources` (>=2) into one golden record under `config`.
pub fn merge(
    sources: &[SourceRecord],
    config: &MergeConfig,
    target_id: Option<String>,
    merged_by: Option<String>,
    queue_item_id: Option<String>,
) -> Result<MergeResult, ResolverError> {
    if sources.len() < 2 {
        return Err(ResolverError::validation(
            "merge requires at least two source records",
        ));
    }

    let mut ids_seen = std::collections::HashSet::new();
    for source in sources {
        if source.created_at > source.updated_at {
            let mut ctx = ErrorContext::new();
            ctx.insert("recordId".to_string(), source.id.clone());
            return Err(ResolverError::validation_with(
                format!("source record '{}' has createdAt after updatedAt", source.id),
                ctx,
            ));
        }
        if !ids_seen.insert(source.id.clone()) {
            let mut ctx = ErrorContext::new();
            ctx.insert("recordId".to_string(), source.id.clone());
            return Err(ResolverError::validation_with(
                format!("duplicate source record id '{}' in merge call", source.id),
                ctx,
            ));
        }
    }

    // 1. Union of all field paths, in order of first appearance.
    let mut field_order: Vec<String> = Vec::new();
    for source in sources {
        for path in source.record.field_paths() {
            if !field_order.contains(&path) {
                field_order.push(path);
            }
        }
    }

    let source_ids: Vec<String> = sources.iter().map(|s| s.id.clone()).collect();
    let mut golden_record = Record::new();
    let mut field_sources: BTreeMap<String, FieldProvenance> = BTreeMap::new();
    let mut conflicts = Vec::new();

    for field in &field_order {
        let values: Vec<Option<JsonValue>> = sources.iter().map(|s| s.record.get(field).cloned()).collect();
        let (strategy, options) = config.strategy_for(field);

        let distinct = distinct_non_null_count(&values);
        let has_conflict = distinct >= 2;

        let resolution = if has_conflict {
            match config.conflict_resolution {
                ConflictResolution::Error => {
                    let mut ctx = ErrorContext::new();
                    ctx.insert("field".to_string(), field.clone());
                    ctx.insert("operation".to_string(), "merge".to_string());
                    return Err(ResolverError::MergeConflict {
                        field: field.clone(),
                        message: format!("field '{field}' has {distinct} conflicting values"),
                        context: ctx,
                    });
                }
                ConflictResolution::UseDefault => ConflictResolutionKind::Auto,
                ConflictResolution::MarkConflict => ConflictResolutionKind::Deferred,
            }
        } else {
            ConflictResolutionKind::Auto
        };

        let output = strategies::apply(strategy, &values, sources, options);

        if let Some(value) = &output {
            golden_record
                .set(field, value.clone())
                .map_err(|e| ResolverError::validation(format!("merge assembly error: {e}")))?;
        }

        let winner = output.as_ref().and_then(|out| {
            sources
                .iter()
                .zip(values.iter())
                .find(|(_, v)| v.as_ref().is_some_and(|v| shallow_eq(v, out)))
                .map(|(s, _)| s.id.clone())
        });

        let all_values: Vec<SourceValue> = sources
            .iter()
            .zip(values.iter())
            .filter_map(|(s, v)| {
                v.clone().map(|v| SourceValue {
                    record_id: s.id.clone(),
                    value: v,
                })
            })
            .collect();

        if has_conflict {
            conflicts.push(MergeConflict {
                field: field.clone(),
                values: all_values.clone(),
                resolution: resolution.clone(),
                resolved_value: output.clone(),
                resolution_reason: None,
            });
        }

        field_sources.insert(
            field.clone(),
            FieldProvenance {
                source_record_id: winner,
                strategy_applied: strategy.name().to_string(),
                all_values,
                had_conflict: has_conflict,
                conflict_resolution: has_conflict.then_some(resolution),
            },
        );
    }

    let golden_record_id = target_id.unwrap_or_else(|| generate_golden_id(&source_ids));
    let conflicts_detected = conflicts.len();

    let provenance = config.track_provenance.then(|| Provenance {
        golden_record_id: golden_record_id.clone(),
        source_record_ids: source_ids.clone(),
        merged_at: Utc::now(),
        merged_by,
        queue_item_id,
        field_sources,
        unmerged: false,
        unmerged_at: None,
        unmerged_by: None,
        unmerge_reason: None,
    });

    Ok(MergeResult {
        golden_record,
        golden_record_id,
        provenance,
        conflicts,
        stats: MergeStats {
            source_count: sources.len(),
            fields_merged: field_order.len(),
            conflicts_detected,
        },
    })
}

/// Reconstruct the original source records from a retained provenance
/// record. Fails if any referenced field value cannot be attributed.
pub fn unmerge(provenance: &Provenance) -> Result<Vec<SourceRecord>, ResolverError> {
    if provenance.unmerged {
        return Err(ResolverError::Unmerge {
            message: format!("golden record '{}' was already unmerged", provenance.golden_record_id),
            context: ErrorContext::new(),
        });
    }

    let now = Utc::now();
    let mut records: BTreeMap<String, Record> = provenance
        .source_record_ids
        .iter()
        .map(|id| (id.clone(), Record::with_id(id.clone())))
        .collect();

    for (field, field_provenance) in &provenance.field_sources {
        for source_value in &field_provenance.all_values {
            let record = records.get_mut(&source_value.record_id).ok_or_else(|| {
                ResolverError::Unmerge {
                    message: format!(
                        "provenance references unknown source record id '{}'",
                        source_value.record_id
                    ),
                    context: ErrorContext::new(),
                }
            })?;
            record
                .set(field, source_value.value.clone())
                .map_err(|e| ResolverError::Unmerge {
                    message: format!("unmerge assembly error on field '{field}': {e}"),
                    context: ErrorContext::new(),
                })?;
        }
    }

    Ok(provenance
        .source_record_ids
        .iter()
        .map(|id| SourceRecord::new(id.clone(), records.remove(id).unwrap_or_default(), now, now))
        .collect())
}
