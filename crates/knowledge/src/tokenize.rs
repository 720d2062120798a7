//! Word tokenization shared by the trigram embedder and the keyword matcher.

use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Lowercased Unicode words of `text`, in order, punctuation dropped.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.unicode_words().map(str::to_lowercase)
}

/// Distinct lowercased words of `text`.
pub fn word_set(text: &str) -> BTreeSet<String> {
    words(text).collect()
}
