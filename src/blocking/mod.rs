//! Blocking key derivation: reduces O(n^2) comparison to O(n*k) by
//! grouping records that share a transformed key. The index itself is
//! stateless — persistence and lookup live in the external repository.

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::record::Record;
use crate::schema::{FieldType, Schema};
use crate::similarity::normalize;

/// Reserved, non-printable separator joining multi-field composite keys.
/// Chosen so it can never appear in a normalized field value.
pub const KEY_SEPARATOR: char = '\u{1f}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Transform {
    Exact,
    Lowercase,
    Soundex,
    FirstLetter,
    FirstN(usize),
}

/// A single field + transform pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldClause {
    pub field: String,
    pub transform: Transform,
}

/// A blocking clause: either a single field/transform pair, or a
/// multi-field composite whose component keys are joined with
/// [`KEY_SEPARATOR`]. All component fields must be present for a
/// composite clause to emit a key at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockingClause {
    Single(FieldClause),
    Multi(Vec<FieldClause>),
}

impl BlockingClause {
    pub fn single(field: impl Into<String>, transform: Transform) -> Self {
        BlockingClause::Single(FieldClause {
            field: field.into(),
            transform,
        })
    }

    pub fn multi(clauses: impl IntoIterator<Item = (String, Transform)>) -> Self {
        BlockingClause::Multi(
            clauses
                .into_iter()
                .map(|(field, transform)| FieldClause { field, transform })
                .collect(),
        )
    }

    fn fields(&self) -> Vec<&FieldClause> {
        match self {
            BlockingClause::Single(clause) => vec![clause],
            BlockingClause::Multi(clauses) => clauses.iter().collect(),
        }
    }
}

/// Ordered list of blocking clauses, validated against a schema.
#[derive(Debug, Clone, Default)]
pub struct BlockingConfig {
    pub clauses: Vec<BlockingClause>,
}

impl BlockingConfig {
    pub fn new(clauses: Vec<BlockingClause>) -> Self {
        Self { clauses }
    }

    /// Reject unknown fields and malformed `firstN` transforms at
    /// configuration build time rather than at query time.
    pub fn validate(&self, schema: &Schema) -> Result<(), ResolverError> {
        for clause in &self.clauses {
            for field_clause in clause.fields() {
                if !schema.contains(&field_clause.field) {
                    return Err(ResolverError::configuration(format!(
                        "blocking clause references unknown field '{}'",
                        field_clause.field
                    )));
                }
                if let Transform::FirstN(n) = field_clause.transform
                    && n == 0
                {
                    return Err(ResolverError::configuration(format!(
                        "blocking clause on field '{}' has firstN(0)",
                        field_clause.field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Derive the full set of blocking keys a record yields under this
    /// configuration. One key per clause at most; a clause that cannot
    /// be satisfied (missing component) emits nothing.
    pub fn keys_for(&self, record: &Record, schema: &Schema) -> Vec<String> {
        self.clauses
            .iter()
            .filter_map(|clause| derive_key(clause, record, schema))
            .collect()
    }
}

fn domain_normalize(field_clause: &FieldClause, raw: &str, schema: &Schema) -> String {
    match schema.get(&field_clause.field).map(|d| d.field_type) {
        Some(FieldType::Phone) => normalize::normalize_phone(raw),
        Some(FieldType::Name) => normalize::normalize_name(raw),
        Some(FieldType::Email) => normalize::normalize_email(raw),
        _ => normalize::fold_case_trim(raw),
    }
}

fn apply_transform(transform: Transform, normalized: &str) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }
    let key = match transform {
        Transform::Exact => normalized.to_string(),
        Transform::Lowercase => normalized.to_lowercase(),
        Transform::Soundex => crate::similarity::soundex::encode(normalized),
        Transform::FirstLetter => normalized.chars().next()?.to_string(),
        Transform::FirstN(n) => normalized.chars().take(n).collect(),
    };
    if key.is_empty() { None } else { Some(key) }
}

fn single_key(field_clause: &FieldClause, record: &Record, schema: &Schema) -> Option<String> {
    let raw = record.get(&field_clause.field)?.as_str()?;
    if raw.trim().is_empty() {
        return None;
    }
    let normalized = domain_normalize(field_clause, raw, schema);
    apply_transform(field_clause.transform, &normalized)
}

fn derive_key(clause: &BlockingClause, record: &Record, schema: &Schema) -> Option<String> {
    match clause {
        BlockingClause::Single(field_clause) => single_key(field_clause, record, schema),
        BlockingClause::Multi(field_clauses) => {
            let mut parts = Vec::with_capacity(field_clauses.len());
            for field_clause in field_clauses {
                parts.push(single_key(field_clause, record, schema)?);
            }
            Some(parts.join(&KEY_SEPARATOR.to_string()))
        }
    }
}
