//! Optional machine-learned predictor composed with the field-scoring
//! engine. The predictor itself is external; this module only specifies
//! the composition modes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Outcome, Score};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub probability: f64,
    pub classification: Outcome,
    pub confidence: f64,
    pub feature_importance: Vec<FeatureImportance>,
}

/// An external classifier an implementer plugs in; the engine never
/// trains or owns one, only calls it.
#[async_trait]
pub trait MlPredictor: Send + Sync {
    async fn predict(&self, a: &crate::record::Record, b: &crate::record::Record) -> Prediction;
}

#[derive(Debug, Clone, Copy)]
pub enum Mode {
    Hybrid { ml_weight: f64 },
    MlOnly,
    Fallback,
}

#[derive(Debug, Clone, Copy)]
pub struct MlThresholds {
    pub no_match: f64,
    pub definite_match: f64,
}

/// Combine an absolute-space score with an ML prediction according to
/// `mode`, returning the final (possibly overridden) outcome.
pub fn combine(
    score: &Score,
    base_outcome: Outcome,
    prediction: &Prediction,
    mode: Mode,
    ml_thresholds: Option<MlThresholds>,
) -> Outcome {
    match mode {
        Mode::Hybrid { ml_weight } => {
            let blended =
                (1.0 - ml_weight) * score.normalized_score + ml_weight * prediction.probability;
            match ml_thresholds {
                Some(t) => classify_probability(blended, t),
                None => base_outcome,
            }
        }
        Mode::MlOnly => match ml_thresholds {
            Some(t) => classify_probability(prediction.probability, t),
            None => prediction.classification.clone(),
        },
        Mode::Fallback => {
            if base_outcome == Outcome::PotentialMatch {
                prediction.classification.clone()
            } else {
                base_outcome
            }
        }
    }
}

fn classify_probability(p: f64, t: MlThresholds) -> Outcome {
    if p >= t.definite_match {
        Outcome::DefiniteMatch
    } else if p < t.no_match {
        Outcome::NoMatch
    } else {
        Outcome::PotentialMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::FieldScore;

    fn score(normalized: f64) -> Score {
        Score {
            total_score: normalized * 100.0,
            max_possible_score: 100.0,
            normalized_score: normalized,
            field_scores: Vec::<FieldScore>::new(),
        }
    }

    fn thresholds() -> MlThresholds {
        MlThresholds {
            no_match: 0.3,
            definite_match: 0.8,
        }
    }

    #[test]
    fn fallback_only_invokes_ml_in_potential_band() {
        let prediction = Prediction {
            probability: 0.95,
            classification: Outcome::DefiniteMatch,
            confidence: 0.9,
            feature_importance: vec![],
        };
        let upgraded = combine(&score(0.5), Outcome::PotentialMatch, &prediction, Mode::Fallback, None);
        assert_eq!(upgraded, Outcome::DefiniteMatch);

        let unchanged = combine(&score(0.95), Outcome::DefiniteMatch, &prediction, Mode::Fallback, None);
        assert_eq!(unchanged, Outcome::DefiniteMatch);
    }

    #[test]
    fn ml_only_uses_probability_thresholds() {
        let prediction = Prediction {
            probability: 0.85,
            classification: Outcome::PotentialMatch,
            confidence: 0.5,
            feature_importance: vec![],
        };
        let outcome = combine(&score(0.1), Outcome::NoMatch, &prediction, Mode::MlOnly, Some(thresholds()));
        assert_eq!(outcome, Outcome::DefiniteMatch);
    }

    #[test]
    fn hybrid_blends_normalized_and_probability() {
        let prediction = Prediction {
            probability: 1.0,
            classification: Outcome::DefiniteMatch,
            confidence: 1.0,
            feature_importance: vec![],
        };
        let outcome = combine(
            &score(0.5),
            Outcome::PotentialMatch,
            &prediction,
            Mode::Hybrid { ml_weight: 0.5 },
            Some(thresholds()),
        );
        // blended = 0.5*0.5 + 0.5*1.0 = 0.75 -> potential band [0.3, 0.8)
        assert_eq!(outcome, Outcome::PotentialMatch);
    }
}
