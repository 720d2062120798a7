//! Error types for the career mentor knowledge engine.
//!
//! A single error enum covers configuration, persistence, embedding and
//! ingestion failures. The knowledge-engine variants mirror the failure
//! classes callers are expected to react to differently.

use thiserror::Error;

/// Unified error type for the career mentor workspace.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding model cannot be loaded or invoked
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Persisted documents and embeddings disagree
    #[error("Store corruption: {0}")]
    StoreCorruption(String),

    /// Rejected ingestion input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence failed after retry; in-memory state is still usable
    #[error("Storage error: {0}")]
    Storage(String),

    /// New knowledge cannot be embedded, so it cannot be ingested
    #[error("Ingestion unavailable: {0}")]
    IngestionUnavailable(String),

    /// An embedding does not match the store's fixed dimensionality
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Near-identical knowledge already exists for the same role and type
    #[error("Duplicate knowledge: similar to '{existing_id}' (score {score:.3})")]
    DuplicateKnowledge { existing_id: String, score: f32 },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
