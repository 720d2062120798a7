//! Keyword-overlap matcher used when semantic search is unavailable.
//!
//! Scores each candidate by how many distinct query words it contains,
//! reported as the covered fraction of the query's words so scores stay in
//! [0, 1]. Candidates sharing no word with the query are not returned.

use crate::search::rank_order;
use crate::tokenize;
use crate::types::{Document, TagFilter};

/// Rank `documents` by word overlap with `query`.
pub fn search<'a, I>(
    documents: I,
    query: &str,
    filter: &TagFilter,
    n_results: usize,
) -> Vec<(&'a Document, f32)>
where
    I: IntoIterator<Item = &'a Document>,
{
    let query_words = tokenize::word_set(query);
    if query_words.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&Document, f32)> = documents
        .into_iter()
        .filter(|document| filter.matches(document))
        .filter_map(|document| {
            let overlap = tokenize::word_set(&document.content)
                .intersection(&query_words)
                .count();
            (overlap > 0).then(|| (document, overlap as f32 / query_words.len() as f32))
        })
        .collect();

    scored.sort_by(|a, b| rank_order(*a, *b));
    scored.truncate(n_results);

    tracing::debug!(
        "Keyword fallback kept {} hits for {} query words",
        scored.len(),
        query_words.len()
    );

    scored
}
