//! Weighted, explainable similarity scoring and outcome classification.

pub mod ml;

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::record::Record;
use crate::schema::{FieldType, Schema};
use crate::similarity::{self, Strategy, normalize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    NoMatch,
    PotentialMatch,
    DefiniteMatch,
}

/// Per-field weight, strategy, and admission threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMatchConfig {
    pub field: String,
    pub strategy: Strategy,
    pub weight: f64,
    pub field_threshold: f64,
}

impl FieldMatchConfig {
    pub fn new(field: impl Into<String>, strategy: Strategy, weight: f64) -> Self {
        Self {
            field: field.into(),
            strategy,
            weight,
            field_threshold: 0.0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.field_threshold = threshold;
        self
    }
}

/// Global classification thresholds, in absolute score space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub no_match: f64,
    pub definite_match: f64,
}

#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub fields: Vec<FieldMatchConfig>,
    pub thresholds: Thresholds,
}

impl MatchConfig {
    pub fn validate(&self, schema: &Schema) -> Result<(), ResolverError> {
        if self.thresholds.no_match > self.thresholds.definite_match {
            return Err(ResolverError::configuration(format!(
                "inverted thresholds: noMatch ({}) > definiteMatch ({})",
                self.thresholds.no_match, self.thresholds.definite_match
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !schema.contains(&field.field) {
                return Err(ResolverError::configuration(format!(
                    "match config references unknown field '{}'",
                    field.field
                )));
            }
            if field.weight < 0.0 {
                return Err(ResolverError::configuration(format!(
                    "field '{}' has negative weight {}",
                    field.field, field.weight
                )));
            }
            if !seen.insert(field.field.clone()) {
                return Err(ResolverError::configuration(format!(
                    "duplicate field '{}' in match config",
                    field.field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldScore {
    pub field: String,
    pub similarity: f64,
    pub weight: f64,
    pub contribution: f64,
    pub met_threshold: bool,
    pub missing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub total_score: f64,
    pub max_possible_score: f64,
    pub normalized_score: f64,
    pub field_scores: Vec<FieldScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub summary: String,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: Score,
    pub outcome: Outcome,
    pub explanation: Explanation,
}

fn extract_normalized(record: &Record, schema: &Schema, field: &str) -> Option<String> {
    let value = record.get(field)?;
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if raw.trim().is_empty() {
        return None;
    }
    let normalized = match schema.get(field).map(|d| d.field_type) {
        Some(FieldType::Email) => normalize::normalize_email(&raw),
        Some(FieldType::Phone) => normalize::normalize_phone(&raw),
        Some(FieldType::Name) => normalize::normalize_name(&raw),
        Some(FieldType::Date) => {
            let formats = schema
                .get(field)
                .map(|d| d.format_hints.date_formats.clone())
                .unwrap_or_default();
            normalize::normalize_date(&raw, &formats)?
        }
        _ => normalize::fold_case_trim(&raw),
    };
    Some(normalized)
}

/// Score two records against `config`, producing a field-by-field
/// breakdown and an aggregate classification.
pub fn score(a: &Record, b: &Record, schema: &Schema, config: &MatchConfig) -> MatchResult {
    let mut field_scores = Vec::with_capacity(config.fields.len());
    let mut missing_fields = Vec::new();
    let mut total_score = 0.0;
    let mut max_possible_score = 0.0;
    let mut matched_summary = Vec::new();

    for field_config in &config.fields {
        max_possible_score += field_config.weight;

        let a_value = extract_normalized(a, schema, &field_config.field);
        let b_value = extract_normalized(b, schema, &field_config.field);

        let (sim, missing) = match (&a_value, &b_value) {
            (Some(av), Some(bv)) => (similarity::compute(field_config.strategy, av, bv).score, false),
            _ => (0.0, true),
        };

        if missing {
            missing_fields.push(field_config.field.clone());
        }

        let met_threshold = !missing && sim >= field_config.field_threshold;
        let contribution = if met_threshold {
            field_config.weight * sim
        } else {
            0.0
        };
        total_score += contribution;

        if met_threshold {
            matched_summary.push(field_config.field.clone());
        }

        field_scores.push(FieldScore {
            field: field_config.field.clone(),
            similarity: sim,
            weight: field_config.weight,
            contribution,
            met_threshold,
            missing,
        });
    }

    let normalized_score = if max_possible_score > 0.0 {
        total_score / max_possible_score
    } else {
        0.0
    };

    let outcome = if total_score >= config.thresholds.definite_match {
        Outcome::DefiniteMatch
    } else if total_score < config.thresholds.no_match {
        Outcome::NoMatch
    } else {
        Outcome::PotentialMatch
    };

    let summary = format!(
        "{}/{} fields matched{}",
        matched_summary.len(),
        config.fields.len(),
        matched_summary
            .first()
            .map(|f| format!(", {f} matched"))
            .unwrap_or_default()
    );

    MatchResult {
        score: Score {
            total_score,
            max_possible_score,
            normalized_score,
            field_scores,
        },
        outcome,
        explanation: Explanation {
            summary,
            missing_fields,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, NameComponent};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .field("firstName", FieldDescriptor::name(NameComponent::First))
            .field("lastName", FieldDescriptor::name(NameComponent::Last))
            .field("email", FieldDescriptor::new(FieldType::Email))
            .field("phone", FieldDescriptor::new(FieldType::Phone))
            .field("dateOfBirth", FieldDescriptor::new(FieldType::Date))
    }

    fn config() -> MatchConfig {
        MatchConfig {
            fields: vec![
                FieldMatchConfig::new("firstName", Strategy::JaroWinkler, 10.0).with_threshold(0.85),
                FieldMatchConfig::new("lastName", Strategy::JaroWinkler, 10.0).with_threshold(0.85),
                FieldMatchConfig::new("email", Strategy::Exact, 20.0),
                FieldMatchConfig::new("phone", Strategy::Exact, 15.0),
                FieldMatchConfig::new("dateOfBirth", Strategy::Exact, 10.0),
            ],
            thresholds: Thresholds {
                no_match: 20.0,
                definite_match: 45.0,
            },
        }
    }

    fn record(first: &str, last: &str, email: &str, phone: &str, dob: &str) -> Record {
        let mut r = Record::new();
        r.set("firstName", json!(first)).unwrap();
        r.set("lastName", json!(last)).unwrap();
        r.set("email", json!(email)).unwrap();
        r.set("phone", json!(phone)).unwrap();
        r.set("dateOfBirth", json!(dob)).unwrap();
        r
    }

    #[test]
    fn s1_definite_match_identical_records() {
        let schema = schema();
        let cfg = config();
        let a = record("John", "Smith", "john.doe@example.com", "+1-555-0100", "1985-03-15");
        let b = a.clone();
        let result = score(&a, &b, &schema, &cfg);
        assert_eq!(result.outcome, Outcome::DefiniteMatch);
        assert!((result.score.total_score - 65.0).abs() < 1e-9);
        assert!((result.score.normalized_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn s2_potential_match_with_typos() {
        let schema = schema();
        let cfg = config();
        let candidate = record("Jon", "Smyth", "john.doe@example.com", "+1-555-0200", "1985-03-20");
        let existing = record("John", "Smith", "john.doe@example.com", "+1-555-0100", "1985-03-15");
        let result = score(&candidate, &existing, &schema, &cfg);
        assert_eq!(result.outcome, Outcome::PotentialMatch);
        assert!(result.score.total_score >= 20.0 && result.score.total_score < 45.0);
    }

    #[test]
    fn score_bounds_hold() {
        let schema = schema();
        let cfg = config();
        let a = record("Jane", "Doe", "jane@x.com", "5551234", "2000-01-01");
        let b = record("Someone", "Else", "other@y.com", "9998888", "1999-12-31");
        let result = score(&a, &b, &schema, &cfg);
        assert!(result.score.total_score >= 0.0);
        assert!(result.score.total_score <= result.score.max_possible_score);
        assert!((0.0..=1.0).contains(&result.score.normalized_score));
    }

    #[test]
    fn missing_field_scores_zero_and_flags() {
        let schema = schema();
        let cfg = config();
        let mut a = record("Jane", "Doe", "jane@x.com", "5551234", "2000-01-01");
        a.fields.remove("phone");
        let b = record("Jane", "Doe", "jane@x.com", "5551234", "2000-01-01");
        let result = score(&a, &b, &schema, &cfg);
        let phone_score = result
            .score
            .field_scores
            .iter()
            .find(|f| f.field == "phone")
            .unwrap();
        assert!(phone_score.missing);
        assert_eq!(phone_score.contribution, 0.0);
        assert!(result.explanation.missing_fields.contains(&"phone".to_string()));
    }

    #[test]
    fn classification_monotonic_in_similarity() {
        let schema = schema();
        let cfg = config();
        let base = record("Robert", "Jones", "a@x.com", "1112222", "1990-01-01");
        let worse = record("Xobert", "Jones", "b@x.com", "1112222", "1990-01-01");
        let better = record("Robert", "Jones", "a@x.com", "1112222", "1990-01-01");

        let worse_score = score(&base, &worse, &schema, &cfg).score.total_score;
        let better_score = score(&base, &better, &schema, &cfg).score.total_score;
        assert!(better_score >= worse_score);
    }

    #[test]
    fn config_validation_rejects_inverted_thresholds() {
        let schema = schema();
        let mut cfg = config();
        cfg.thresholds = Thresholds {
            no_match: 50.0,
            definite_match: 10.0,
        };
        assert!(cfg.validate(&schema).is_err());
    }

    #[test]
    fn config_validation_rejects_negative_weight() {
        let schema = schema();
        let mut cfg = config();
        cfg.fields[0].weight = -1.0;
        assert!(cfg.validate(&schema).is_err());
    }
}
