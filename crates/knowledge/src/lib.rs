//! Semantic knowledge retrieval for the career mentor.
//!
//! Short career passages are embedded, stored with their embeddings in a
//! persistent record store and ranked by cosine similarity. When the
//! embedder is unavailable, a keyword matcher ranks instead.

pub mod embeddings;
pub mod engine;
pub mod fallback;
pub mod ingest;
pub mod search;
pub mod seed;
pub mod store;
pub mod tokenize;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use engine::KnowledgeEngine;
pub use store::{LoadOutcome, RecordStore, Records, RecordsView};
pub use types::{
    Document, EngineStats, EngineStatus, NewDocument, SearchOptions, SearchResponse, SearchResult,
    TagFilter,
};
