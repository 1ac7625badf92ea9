//! Pure similarity primitives: `(a, b) -> similarity in [0,1]`.
//!
//! Primitives never fail. Invalid or degenerate inputs produce `0.0`;
//! callers that need to distinguish "genuinely dissimilar" from
//! "unusable input" should check [`compute`]'s returned diagnostic flag.

pub mod exact;
pub mod jaro_winkler;
pub mod levenshtein;
pub mod normalize;
pub mod soundex;

use serde::{Deserialize, Serialize};

/// The strategies a field's match configuration may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Exact,
    JaroWinkler,
    Levenshtein,
    Soundex,
}

/// Result of running a strategy, including whether the inputs were
/// unusable (both empty, etc.) rather than merely dissimilar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedSimilarity {
    pub score: f64,
    pub degenerate: bool,
}

/// Dispatch to the primitive named by `strategy`.
pub fn compute(strategy: Strategy, a: &str, b: &str) -> ComputedSimilarity {
    let degenerate = a.is_empty() && b.is_empty();
    let score = match strategy {
        Strategy::Exact => exact::similarity(a, b),
        Strategy::JaroWinkler => jaro_winkler::similarity(a, b),
        Strategy::Levenshtein => levenshtein::similarity(a, b),
        Strategy::Soundex => soundex::similarity(a, b),
    };
    ComputedSimilarity { score, degenerate }
}
