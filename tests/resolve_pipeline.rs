use resolvix::blocking::{BlockingClause, BlockingConfig, Transform};
use resolvix::matching::{FieldMatchConfig, MatchConfig, Thresholds};
use resolvix::merge::{self, ConflictResolution, MergeConfig, NullHandling, StrategyKind, StrategyOptions};
use resolvix::queue::QueueFilter;
use resolvix::record::{Record, SourceRecord};
use resolvix::schema::{FieldDescriptor, FieldType, Schema};
use resolvix::similarity::Strategy;
use resolvix::{Resolver, ResolverConfigBuilder, ResolutionOutcome};

use chrono::Utc;
use serde_json::json;

fn schema() -> Schema {
    Schema::new()
        .field("email", FieldDescriptor::new(FieldType::Email))
        .field("lastName", FieldDescriptor::new(FieldType::Name))
        .field("phone", FieldDescriptor::new(FieldType::Phone))
}

fn resolver() -> Resolver {
    let config = ResolverConfigBuilder::new(schema())
        .blocking(BlockingConfig::new(vec![BlockingClause::single("email", Transform::Lowercase)]))
        .matching(MatchConfig {
            fields: vec![
                FieldMatchConfig::new("email", Strategy::Exact, 50.0),
                FieldMatchConfig::new("lastName", Strategy::JaroWinkler, 30.0),
                FieldMatchConfig::new("phone", Strategy::Exact, 20.0),
            ],
            thresholds: Thresholds {
                no_match: 30.0,
                definite_match: 95.0,
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
        .expect("valid configuration");

    Resolver::new(config)
}

fn record(email: &str, last_name: &str, phone: &str) -> Record {
    let mut r = Record::new();
    r.set("email", json!(email)).unwrap();
    r.set("lastName", json!(last_name)).unwrap();
    r.set("phone", json!(phone)).unwrap();
    r
}

#[tokio::test]
async fn ambiguous_match_is_queued_then_confirmed_and_merged() {
    let mut resolver = resolver();
    let incoming = record("a@x.com", "Smith", "555-0100");
    let candidate = record("a@x.com", "Smyth", "555-0199");

    let outcome = resolver.resolve("q1", incoming.clone(), vec![candidate.clone()], 5).await;

    let item_id = match outcome {
        ResolutionOutcome::Queued(item) => {
            assert_eq!(item.potential_matches.len(), 1);
            item.id
        }
        _ => panic!("expected queued outcome for an ambiguous pair"),
    };

    let item = resolver.queue_mut().get_mut(&item_id).expect("item exists");
    item.confirm(Some("reviewer-1".to_string()), Some("candidate-0".to_string()), None).unwrap();

    let found = resolver.queue().find(&QueueFilter {
        statuses: vec![resolvix::queue::Status::Confirmed],
        ..Default::default()
    });
    assert_eq!(found.len(), 1);

    let now = Utc::now();
    let sources = vec![
        SourceRecord::new("s1", incoming, now, now),
        SourceRecord::new("s2", candidate, now, now),
    ];
    let merge_config = MergeConfig {
        field_strategies: vec![],
        default_strategy: StrategyKind::PreferNewer,
        default_options: StrategyOptions {
            null_handling: Some(NullHandling::Skip),
            remove_duplicates: true,
            date_field: None,
        },
        track_provenance: true,
        conflict_resolution: ConflictResolution::MarkConflict,
    };
    let result = merge::merge(&sources, &merge_config, Some("golden-1".to_string()), Some("reviewer-1".to_string()), Some(item_id)).unwrap();
    assert_eq!(result.golden_record.get("email").unwrap(), &json!("a@x.com"));
    assert!(result.provenance.is_consistent());
}

#[tokio::test]
async fn identical_records_resolve_as_a_clean_definite_match() {
    let mut resolver = resolver();
    let incoming = record("same@x.com", "Jones", "555-0001");
    let outcome = resolver.resolve("q2", incoming.clone(), vec![incoming], 0).await;
    assert!(matches!(outcome, ResolutionOutcome::DefiniteMatch { .. }));
    assert!(resolver.queue().get("q2").is_none());
}

#[tokio::test]
async fn dissimilar_records_never_reach_the_queue() {
    let mut resolver = resolver();
    let incoming = record("one@x.com", "Adams", "555-1111");
    let other = record("two@y.com", "Zorro", "555-9999");
    let outcome = resolver.resolve("q3", incoming, vec![other], 0).await;
    assert!(matches!(outcome, ResolutionOutcome::NoMatch));
}
