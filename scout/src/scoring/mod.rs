//! Pure score composition: no I/O, deterministic for identical inputs.
//!
//! The oracle supplies raw per-criterion values; everything here is plain
//! arithmetic so cached results and cold recomputes are bit-identical.

use std::collections::HashMap;

use crate::models::score::{
    Criterion, CriterionScore, ScoreBreakdown, NEUTRAL_SCORE, SCORE_MAX, SCORE_MIN,
};

/// Weighted sum over clamped criterion values, clamped to [0,10] and
/// rounded to one decimal for presentation.
pub fn compose(scores: &[CriterionScore]) -> f64 {
    let total: f64 = scores
        .iter()
        .map(|s| s.criterion.weight() * s.value.clamp(SCORE_MIN, SCORE_MAX))
        .sum();
    round_one_decimal(total.clamp(SCORE_MIN, SCORE_MAX))
}

/// Assemble a full breakdown from raw oracle output.
///
/// Enforces exactly one score per criterion: duplicates resolve to the last
/// occurrence, missing criteria are filled with [`NEUTRAL_SCORE`], and
/// out-of-range values are clamped. Each repair is logged rather than
/// failing the whole breakdown.
pub fn build_breakdown(raw: Vec<CriterionScore>) -> ScoreBreakdown {
    let mut by_criterion: HashMap<Criterion, CriterionScore> = HashMap::new();
    for score in raw {
        if by_criterion.contains_key(&score.criterion) {
            tracing::warn!(
                criterion = score.criterion.as_str(),
                "duplicate criterion in oracle output, keeping last occurrence"
            );
        }
        by_criterion.insert(score.criterion, score);
    }

    let scores = Criterion::ALL
        .iter()
        .map(|criterion| match by_criterion.remove(criterion) {
            Some(mut score) => {
                if !(SCORE_MIN..=SCORE_MAX).contains(&score.value) {
                    tracing::warn!(
                        criterion = criterion.as_str(),
                        value = score.value,
                        "criterion value out of range, clamping"
                    );
                    score.value = score.value.clamp(SCORE_MIN, SCORE_MAX);
                }
                score
            }
            None => {
                tracing::warn!(
                    criterion = criterion.as_str(),
                    "criterion missing from oracle output, using neutral score"
                );
                CriterionScore::new(*criterion, NEUTRAL_SCORE)
            }
        })
        .collect::<Vec<_>>();

    let composite = compose(&scores);
    ScoreBreakdown { scores, composite }
}

/// All-neutral fallback breakdown (composite 5.0).
pub fn neutral_breakdown() -> ScoreBreakdown {
    build_breakdown(Vec::new())
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
