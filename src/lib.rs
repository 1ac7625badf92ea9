//! `resolvix`: a deterministic, explainable identity-resolution engine.
//!
//! A [`Resolver`] ties together a [`schema::Schema`], blocking rules,
//! a matching configuration, a merge configuration, and a review
//! queue. It resolves incoming records against a known population,
//! routes ambiguous candidates to the queue for a human decision, and
//! merges confirmed matches into golden records with full provenance.

pub mod blocking;
pub mod config;
pub mod dedup;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod matching;
pub mod merge;
pub mod queue;
pub mod record;
pub mod repository;
pub mod resilience;
pub mod schema;
pub mod services;
pub mod similarity;

use blocking::BlockingConfig;
use error::ResolverError;
use matching::{MatchConfig, Outcome};
use matching::ml::{self, MlPredictor, Mode as MlMode};
use merge::MergeConfig;
use queue::{PotentialMatch, QueueItem, ReviewQueue};
use record::Record;
use schema::Schema;

/// Immutable, validated configuration for a [`Resolver`] instance.
pub struct ResolverConfig {
    pub schema: Schema,
    pub blocking: BlockingConfig,
    pub matching: MatchConfig,
    pub merge: MergeConfig,
    pub ml: Option<(Box<dyn MlPredictor>, MlMode, Option<ml::MlThresholds>)>,
}

/// Builds a [`ResolverConfig`], validating every piece against the
/// schema before it can be used.
pub struct ResolverConfigBuilder {
    schema: Schema,
    blocking: Option<BlockingConfig>,
    matching: Option<MatchConfig>,
    merge: Option<MergeConfig>,
    ml: Option<(Box<dyn MlPredictor>, MlMode, ml::MlThresholds)>,
}

impl ResolverConfigBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            blocking: None,
            matching: None,
            merge: None,
            ml: None,
        }
    }

    pub fn blocking(mut self, blocking: BlockingConfig) -> Self {
        self.blocking = Some(blocking);
        self
    }

    pub fn matching(mut self, matching: MatchConfig) -> Self {
        self.matching = Some(matching);
        self
    }

    pub fn merge(mut self, merge: MergeConfig) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn ml_predictor(mut self, predictor: Box<dyn MlPredictor>, mode: MlMode, thresholds: Option<ml::MlThresholds>) -> Self {
        self.ml = Some((predictor, mode, thresholds));
        self
    }

    pub fn build(self) -> Result<ResolverConfig, ResolverError> {
        self.schema.validate()?;
        let blocking = self.blocking.ok_or_else(|| ResolverError::configuration("blocking configuration is required"))?;
        let matching = self.matching.ok_or_else(|| ResolverError::configuration("matching configuration is required"))?;
        let merge = self.merge.ok_or_else(|| ResolverError::configuration("merge configuration is required"))?;

        blocking.validate(&self.schema)?;
        matching.validate(&self.schema)?;
        merge.validate(&self.schema)?;

        Ok(ResolverConfig {
            schema: self.schema,
            blocking,
            matching,
            merge,
            ml: self.ml,
        })
    }
}

/// Outcome of resolving a single incoming record against a population.
pub enum ResolutionOutcome {
    /// No candidate scored above the no-match threshold; the record is
    /// new to the population.
    NoMatch,
    /// At least one candidate needs a human decision; a queue item was
    /// created.
    Queued(QueueItem),
    /// Exactly one candidate scored a definite match.
    DefiniteMatch { candidate: Record, score: matching::Score },
}

/// The engine core: stateless over schema/blocking/matching/merge
/// configuration, holding only the in-process review queue.
pub struct Resolver {
    config: ResolverConfig,
    queue: ReviewQueue,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            queue: ReviewQueue::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn queue(&self) -> &ReviewQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut ReviewQueue {
        &mut self.queue
    }

    /// Blocking keys for `record` under this resolver's configuration.
    pub fn blocking_keys(&self, record: &Record) -> Vec<String> {
        self.config.blocking.keys_for(record, &self.config.schema)
    }

    /// Scores `record` against every member of `candidates`, applying
    /// the ML predictor (if configured) on top of the rule-based score,
    /// and decides whether the record is new, queued for review, or a
    /// clean definite match.
    pub async fn resolve(&mut self, queue_item_id: impl Into<String>, record: Record, candidates: Vec<Record>, priority: i64) -> ResolutionOutcome {
        let mut potential = Vec::new();
        let mut definite: Option<(Record, matching::Score)> = None;

        for candidate in candidates {
            let mut result = matching::score(&record, &candidate, &self.config.schema, &self.config.matching);

            if let Some((predictor, mode, ml_thresholds)) = &self.config.ml {
                let prediction = predictor.predict(&record, &candidate).await;
                result.outcome = ml::combine(&result.score, result.outcome, &prediction, *mode, *ml_thresholds);
            }

            match result.outcome {
                Outcome::NoMatch => {}
                Outcome::PotentialMatch => potential.push(PotentialMatch {
                    record: candidate,
                    score: result.score,
                    outcome: result.outcome,
                    explanation: result.explanation,
                }),
                Outcome::DefiniteMatch => {
                    if definite.is_none() {
                        definite = Some((candidate, result.score));
                    } else {
                        potential.push(PotentialMatch {
                            record: candidate,
                            score: result.score,
                            outcome: result.outcome,
                            explanation: result.explanation,
                        });
                    }
                }
            }
        }

        if let Some((candidate, score)) = definite {
            if potential.is_empty() {
                return ResolutionOutcome::DefiniteMatch { candidate, score };
            }
            potential.push(PotentialMatch {
                record: candidate.clone(),
                score: score.clone(),
                outcome: Outcome::DefiniteMatch,
                explanation: matching::Explanation {
                    summary: "definite match alongside other candidates needing review".to_string(),
                    missing_fields: vec![],
                },
            });
        }

        if potential.is_empty() {
            return ResolutionOutcome::NoMatch;
        }

        let item = QueueItem::new(queue_item_id, record, potential, priority);
        self.queue.insert(item.clone());
        ResolutionOutcome::Queued(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::{BlockingClause, Transform};
    use crate::matching::{FieldMatchConfig, Thresholds};
    use crate::merge::{ConflictResolution, MergeConfig, NullHandling, StrategyKind, StrategyOptions};
    use crate::schema::{FieldDescriptor, FieldType};
    use crate::similarity::Strategy;
    use serde_json::json;

    fn config() -> ResolverConfig {
        let schema = Schema::new()
            .field("email", FieldDescriptor::new(FieldType::Email))
            .field("lastName", FieldDescriptor::new(FieldType::Name));

        ResolverConfigBuilder::new(schema.clone())
            .blocking(BlockingConfig::new(vec![BlockingClause::single("email", Transform::Lowercase)]))
            .matching(MatchConfig {
                fields: vec![
                    FieldMatchConfig::new("email", Strategy::Exact, 60.0),
                    FieldMatchConfig::new("lastName", Strategy::JaroWinkler, 40.0),
                ],
                thresholds: Thresholds {
                    no_match: 30.0,
                    definite_match: 90.0,
                },
            })
            .merge(MergeConfig {
                field_strategies: vec![],
                default_strategy: StrategyKind::PreferNewer,
                default_options: StrategyOptions {
                    null_handling: Some(NullHandling::Skip),
                    remove_duplicates: true,
                    date_field: None,
                },
                track_provenance: true,
                conflict_resolution: ConflictResolution::MarkConflict,
            })
            .build()
            .unwrap()
    }

    fn record(email: &str, last_name: &str) -> Record {
        let mut r = Record::new();
        r.set("email", json!(email)).unwrap();
        r.set("lastName", json!(last_name)).unwrap();
        r
    }

    #[tokio::test]
    async fn resolve_returns_no_match_for_dissimilar_candidate() {
        let mut resolver = Resolver::new(config());
        let outcome = resolver
            .resolve("q1", record("a@x.com", "Smith"), vec![record("b@y.com", "Jones")], 0)
            .await;
        assert!(matches!(outcome, ResolutionOutcome::NoMatch));
    }

    #[tokio::test]
    async fn resolve_returns_definite_match_for_identical_candidate() {
        let mut resolver = Resolver::new(config());
        let outcome = resolver
            .resolve("q1", record("a@x.com", "Smith"), vec![record("a@x.com", "Smith")], 0)
            .await;
        assert!(matches!(outcome, ResolutionOutcome::DefiniteMatch { .. }));
    }

    #[tokio::test]
    async fn resolve_queues_ambiguous_candidates() {
        let mut resolver = Resolver::new(config());
        let outcome = resolver
            .resolve("q1", record("a@x.com", "Smith"), vec![record("b@x.com", "Smyth")], 0)
            .await;
        match outcome {
            ResolutionOutcome::Queued(item) => {
                assert_eq!(item.potential_matches.len(), 1);
                assert!(resolver.queue().get("q1").is_some());
            }
            _ => panic!("expected a queued item"),
        }
    }
}
