//! Exhaustive cosine-similarity search.
//!
//! Every candidate is scored; results are ordered by descending score with
//! ties going to the earlier insertion, so identical queries over an
//! unchanged store always produce identical output.

use crate::types::{Document, TagFilter};
use std::cmp::Ordering;

/// Calculate cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm, when lengths differ, or
/// when the result is not finite. Scores are clamped to [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32;
    if !score.is_finite() || score == 0.0 {
        // Also folds -0.0 into 0.0 so it ties with other zero scores
        return 0.0;
    }
    score
}

/// Descending score, then ascending insertion sequence.
pub(crate) fn rank_order(a: (&Document, f32), b: (&Document, f32)) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| a.0.sequence.cmp(&b.0.sequence))
}

/// Rank `records` against `query`.
///
/// Records failing `filter` are skipped; scores below `threshold` are
/// discarded. Returns at most `n_results` hits, possibly none.
pub fn search<'a, I>(
    records: I,
    query: &[f32],
    filter: &TagFilter,
    n_results: usize,
    threshold: Option<f32>,
) -> Vec<(&'a Document, f32)>
where
    I: IntoIterator<Item = (&'a Document, &'a [f32])>,
{
    let mut scored: Vec<(&Document, f32)> = records
        .into_iter()
        .filter(|(document, _)| filter.matches(document))
        .map(|(document, embedding)| (document, cosine_similarity(query, embedding)))
        .filter(|(_, score)| threshold.map_or(true, |min| *score >= min))
        .collect();

    scored.sort_by(|a, b| rank_order(*a, *b));
    scored.truncate(n_results);

    tracing::debug!(
        "Semantic search kept {} hits (requested top-{})",
        scored.len(),
        n_results
    );

    scored
}
