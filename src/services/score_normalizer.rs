// src/services/score_normalizer.rs
//
// Score Normalizer
//
// Turns raw per-category point totals into two derived forms:
// - a popularity-adjusted score, weighting up categories backed by more
//   rated titles (up to a configurable ceiling)
// - a normalized score in a fixed target range, blending linear and
//   logarithmic percentiles 50/50 so one extreme favorite cannot flatten
//   every other distinction
//
// Pure transformations: inputs are never mutated, output order matches
// input order, and no input can make these functions fail.

use crate::domain::PreferenceScore;

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Weight each score up by how many titles back it, relative to the
/// best-backed category: `boost = 1 + (count / max_count) * (max_boost% / 100)`.
/// Scores keep their sign; a negative total boosted is more negative.
pub fn apply_popularity_boost(
    scores: &[PreferenceScore],
    max_boost_percent: f64,
) -> Vec<PreferenceScore> {
    let max_count = scores.iter().map(|s| s.count).max().unwrap_or(0);
    if max_count == 0 {
        return scores.to_vec();
    }

    scores
        .iter()
        .map(|score| {
            let boost = 1.0 + (score.count as f64 / max_count as f64) * (max_boost_percent / 100.0);
            let mut adjusted = score.clone();
            adjusted.popularity_adjusted_score = Some(round1(score.raw_score * boost));
            adjusted
        })
        .collect()
}

/// Map scores into `[min_target, max_target]` (asymmetric ranges allowed).
///
/// Positive and negative scores are normalized against their own group's
/// maximum magnitude; zero scores map to exactly 0. When every input score
/// is equal there is no distribution to spread, so everything maps to 0.
pub fn normalize_scores(
    scores: &[PreferenceScore],
    min_target: f64,
    max_target: f64,
) -> Vec<PreferenceScore> {
    if scores.is_empty() {
        return Vec::new();
    }

    let values: Vec<f64> = scores.iter().map(|s| s.score_to_use()).collect();

    let all_equal = values.windows(2).all(|w| w[0] == w[1]);
    if all_equal {
        return scores
            .iter()
            .map(|score| {
                let mut normalized = score.clone();
                normalized.normalized_score = Some(0.0);
                normalized
            })
            .collect();
    }

    let max_positive = values.iter().copied().filter(|v| *v > 0.0).fold(0.0, f64::max);
    let max_negative = values
        .iter()
        .copied()
        .filter(|v| *v < 0.0)
        .fold(0.0, |acc: f64, v| acc.max(v.abs()));

    scores
        .iter()
        .zip(values.iter())
        .map(|(score, &value)| {
            let mut normalized = score.clone();
            normalized.normalized_score = Some(if value > 0.0 {
                round1(blend_percentile(value, max_positive) * max_target)
            } else if value < 0.0 {
                -round1(blend_percentile(value.abs(), max_negative) * min_target.abs())
            } else {
                0.0
            });
            normalized
        })
        .collect()
}

/// 50/50 blend of the linear and logarithmic percentile of `value` against
/// the group maximum
fn blend_percentile(value: f64, group_max: f64) -> f64 {
    let linear = value / group_max;
    let logarithmic = (value + 1.0).ln() / (group_max + 1.0).ln();
    (linear + logarithmic) / 2.0
}
