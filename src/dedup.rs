//! Batch self-deduplication: bucket by blocking key, score every pair
//! within a bucket, and union definite-match pairs into clusters.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::blocking::BlockingConfig;
use crate::matching::{self, MatchConfig, Outcome, Score};
use crate::record::Record;
use crate::schema::Schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairResult {
    pub i: usize,
    pub j: usize,
    pub outcome: Outcome,
    pub score: Score,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupStats {
    pub total_records: usize,
    pub total_comparisons: usize,
    pub definite_matches_found: usize,
    pub potential_matches_found: usize,
    pub no_matches_found: usize,
    pub reduction_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupResult {
    pub pairs: Vec<PairResult>,
    /// Cluster id (the minimum record index in the cluster) for every
    /// input record index, in input order.
    pub clusters: Vec<usize>,
    pub stats: DedupStats,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // keep the smaller index as representative, deterministically
            if ra < rb {
                self.parent[rb] = ra;
            } else {
                self.parent[ra] = rb;
            }
        }
    }
}

/// Deduplicate `records` against themselves, returning every non-trivial
/// pairwise comparison plus deterministic cluster assignments.
pub fn deduplicate_batch(
    records: &[Record],
    schema: &Schema,
    blocking: &BlockingConfig,
    matching: &MatchConfig,
) -> DedupResult {
    let n = records.len();

    // 1. Bucket by blocking key, deduplicating record membership per key.
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        for key in blocking.keys_for(record, schema) {
            let bucket = buckets.entry(key).or_default();
            if !bucket.contains(&idx) {
                bucket.push(idx);
            }
        }
    }

    // 2. Enumerate unordered pairs per bucket, deduped across buckets.
    let mut seen_pairs: HashSet<(usize, usize)> = HashSet::new();
    let mut ordered_buckets: Vec<&String> = buckets.keys().collect();
    ordered_buckets.sort();

    for key in ordered_buckets {
        let members = &buckets[key];
        let mut sorted_members = members.clone();
        sorted_members.sort_unstable();
        for a in 0..sorted_members.len() {
            for b in (a + 1)..sorted_members.len() {
                let (i, j) = (sorted_members[a], sorted_members[b]);
                seen_pairs.insert((i.min(j), i.max(j)));
            }
        }
    }

    let mut pair_list: Vec<(usize, usize)> = seen_pairs.into_iter().collect();
    pair_list.sort();

    // 3. Score every pair, emit outcomes != NoMatch.
    let mut union_find = UnionFind::new(n);
    let mut pairs = Vec::new();
    let mut definite = 0usize;
    let mut potential = 0usize;
    let mut no_match = 0usize;

    for (i, j) in &pair_list {
        let result = matching::score(&records[*i], &records[*j], schema, matching);
        match result.outcome {
            Outcome::DefiniteMatch => {
                definite += 1;
                union_find.union(*i, *j);
                pairs.push(PairResult {
                    i: *i,
                    j: *j,
                    outcome: result.outcome,
                    score: result.score,
                });
            }
            Outcome::PotentialMatch => {
                potential += 1;
                pairs.push(PairResult {
                    i: *i,
                    j: *j,
                    outcome: result.outcome,
                    score: result.score,
                });
            }
            Outcome::NoMatch => no_match += 1,
        }
    }

    let clusters: Vec<usize> = (0..n).map(|i| union_find_find(&mut union_find, i)).collect();

    let max_comparisons = if n >= 2 { n * (n - 1) / 2 } else { 0 };
    let total_comparisons = pair_list.len();
    let reduction_ratio = if max_comparisons > 0 {
        1.0 - (total_comparisons as f64 / max_comparisons as f64)
    } else {
        0.0
    };

    DedupResult {
        pairs,
        clusters,
        stats: DedupStats {
            total_records: n,
            total_comparisons,
            definite_matches_found: definite,
            potential_matches_found: potential,
            no_matches_found: no_match,
            reduction_ratio,
        },
    }
}

fn union_find_find(uf: &mut UnionFind, i: usize) -> usize {
    uf.find(i)
}
