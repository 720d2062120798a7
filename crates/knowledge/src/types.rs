//! Knowledge engine type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Provenance tag for knowledge shipped with the engine.
pub const SOURCE_INITIAL: &str = "initial_knowledge";

/// Provenance tag for knowledge added at runtime.
pub const SOURCE_USER: &str = "user_added";

/// A stored knowledge entry. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier assigned at insertion
    pub id: String,

    /// Text content (never empty)
    pub content: String,

    /// Normalized job-role tag (e.g. "data_scientist")
    pub job_role: String,

    /// Normalized content-type tag (e.g. "career_tip", "resume_example")
    pub content_type: String,

    /// Insertion sequence number, strictly increasing across the store
    pub sequence: u64,

    /// Where the knowledge came from
    pub source: String,

    /// When the document was appended
    pub created_at: DateTime<Utc>,
}

/// Knowledge waiting to be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub content: String,
    pub job_role: String,
    pub content_type: String,
    pub source: String,
}

impl NewDocument {
    /// Create user-added knowledge.
    pub fn new(
        content: impl Into<String>,
        job_role: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            job_role: job_role.into(),
            content_type: content_type.into(),
            source: SOURCE_USER.to_string(),
        }
    }

    /// Override the provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Normalize a free-form tag: trimmed, lowercased, whitespace runs become `_`.
///
/// "Data Scientist" and "data_scientist" name the same role.
pub fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Tag constraints shared by semantic and keyword search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFilter {
    job_role: Option<String>,
    content_type: Option<String>,
}

impl TagFilter {
    /// Build a filter; blank tags are treated as absent.
    pub fn new(job_role: Option<&str>, content_type: Option<&str>) -> Self {
        let normalize = |tag: Option<&str>| tag.map(normalize_tag).filter(|t| !t.is_empty());
        Self {
            job_role: normalize(job_role),
            content_type: normalize(content_type),
        }
    }

    /// Whether a document passes every configured constraint.
    pub fn matches(&self, document: &Document) -> bool {
        self.job_role
            .as_deref()
            .map_or(true, |role| document.job_role == role)
            && self
                .content_type
                .as_deref()
                .map_or(true, |ty| document.content_type == ty)
    }
}

/// Options for a knowledge search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Query text
    pub query: String,

    /// Restrict results to this job role
    pub job_role: Option<String>,

    /// Restrict results to this content type
    pub content_type: Option<String>,

    /// Maximum number of results (engine default when unset)
    pub n_results: Option<usize>,

    /// Minimum cosine score (engine default when unset)
    pub similarity_threshold: Option<f32>,
}

impl SearchOptions {
    /// Create options for a query with engine defaults.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_job_role(mut self, job_role: impl Into<String>) -> Self {
        self.job_role = Some(job_role.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_n_results(mut self, n_results: usize) -> Self {
        self.n_results = Some(n_results);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub(crate) fn filter(&self) -> TagFilter {
        TagFilter::new(self.job_role.as_deref(), self.content_type.as_deref())
    }
}

/// A ranked search hit as handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub job_role: String,
    pub content_type: String,
    /// Cosine similarity for semantic results, query-term coverage for
    /// keyword fallback results
    pub score: f32,
}

impl SearchResult {
    pub(crate) fn from_scored(document: &Document, score: f32) -> Self {
        Self {
            id: document.id.clone(),
            content: document.content.clone(),
            job_role: document.job_role.clone(),
            content_type: document.content_type.clone(),
            score,
        }
    }
}

/// Outcome of `semantic_search`: always a (possibly empty) ranked list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,

    /// True when the keyword matcher produced the ranking
    pub used_fallback: bool,
}

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Uninitialized,
    Loading,
    Ready,
    Degraded,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineStatus::Uninitialized => "uninitialized",
            EngineStatus::Loading => "loading",
            EngineStatus::Ready => "ready",
            EngineStatus::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub status: EngineStatus,

    /// Number of stored documents
    pub count: usize,

    /// Embedding dimensionality (0 until the first embedding is stored)
    pub dimensions: usize,

    /// Directory holding the persisted store
    pub store_path: PathBuf,

    /// "provider/model" of the active embedder
    pub embedder: Option<String>,

    /// Why the engine is degraded, if it is
    pub degraded_reason: Option<String>,
}
