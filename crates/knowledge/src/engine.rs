//! The knowledge engine: one store, one embedder, an explicit lifecycle.
//!
//! `Uninitialized -> Loading -> Ready | Degraded`. A degraded engine still
//! answers queries through the keyword matcher but refuses new knowledge.
//! With nothing stored, the matcher ranks the built-in corpus instead.

use crate::embeddings::EmbeddingProvider;
use crate::fallback;
use crate::ingest;
use crate::search;
use crate::seed;
use crate::store::{LoadOutcome, RecordStore, RecordsView};
use crate::types::{
    Document, EngineStats, EngineStatus, NewDocument, SearchOptions, SearchResponse, SearchResult,
};
use mentor_core::{AppError, AppResult, KnowledgeConfig};
use std::sync::{Arc, OnceLock, RwLock};

/// Text embedded at startup to confirm the embedder works.
const PROBE_TEXT: &str = "career knowledge probe";

#[derive(Debug)]
struct Lifecycle {
    status: EngineStatus,
    degraded_reason: Option<String>,
}

/// Semantic knowledge-retrieval engine.
#[derive(Debug)]
pub struct KnowledgeEngine {
    config: KnowledgeConfig,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    store: RecordStore,
    lifecycle: RwLock<Lifecycle>,
    builtin: OnceLock<Vec<Document>>,
}

impl KnowledgeEngine {
    /// Create an uninitialized engine. Nothing touches disk until `initialize`.
    pub fn new(config: KnowledgeConfig, embedder: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        let store = RecordStore::empty(config.store_path.clone());
        Self {
            config,
            embedder,
            store,
            lifecycle: RwLock::new(Lifecycle {
                status: EngineStatus::Uninitialized,
                degraded_reason: None,
            }),
            builtin: OnceLock::new(),
        }
    }

    /// Create and initialize an engine.
    pub async fn open(
        config: KnowledgeConfig,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> AppResult<Self> {
        let engine = Self::new(config, embedder);
        engine.initialize().await?;
        Ok(engine)
    }

    /// Load the store, probe the embedder and seed a fresh store.
    ///
    /// Load and embedder failures do not fail the call; they leave the
    /// engine `Degraded`.
    ///
    /// # Errors
    /// * `AppError::Config` - the engine was already initialized or is loading
    pub async fn initialize(&self) -> AppResult<EngineStatus> {
        self.begin_loading()?;
        tracing::info!("Initializing knowledge engine at {:?}", self.store.dir());

        let outcome = match self.store.reload() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Knowledge store failed to load: {}", e);
                return Ok(self.degrade(e.to_string()));
            }
        };

        let embedder = match &self.embedder {
            Some(embedder) => Arc::clone(embedder),
            None => return Ok(self.degrade("No embedding provider configured".to_string())),
        };

        if let Err(reason) = self.probe(embedder.as_ref()).await {
            return Ok(self.degrade(reason));
        }

        if outcome == LoadOutcome::Fresh && self.config.seed_on_init {
            match ingest::ingest_batch(&self.store, embedder.as_ref(), seed::initial_knowledge())
                .await
            {
                Ok(documents) => {
                    tracing::info!("Seeded {} initial knowledge documents", documents.len())
                }
                Err(AppError::Storage(reason)) => {
                    tracing::warn!("Initial knowledge kept in memory only: {}", reason)
                }
                Err(e) => {
                    return Ok(self.degrade(format!("Seeding initial knowledge failed: {}", e)))
                }
            }
        }

        self.set_status(EngineStatus::Ready, None);
        tracing::info!(
            "Knowledge engine ready: {} documents, embedder {}/{}",
            self.store.len(),
            embedder.provider_name(),
            embedder.model_name()
        );
        Ok(EngineStatus::Ready)
    }

    /// Rank stored knowledge against `options.query`.
    ///
    /// Never fails: when the engine is not ready or the query cannot be
    /// embedded, the keyword matcher ranks instead and `used_fallback` is set.
    pub async fn semantic_search(&self, options: &SearchOptions) -> SearchResponse {
        let n_results = options.n_results.unwrap_or(self.config.default_results);
        let threshold = options
            .similarity_threshold
            .or(self.config.similarity_threshold);
        let filter = options.filter();

        let status = self.status();
        let query_embedding = match (&self.embedder, status) {
            (Some(embedder), EngineStatus::Ready) => match embedder.embed(&options.query).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    tracing::warn!("Query embedding failed, using keyword fallback: {}", e);
                    None
                }
            },
            (_, status) => {
                tracing::debug!("Engine is {}, using keyword fallback", status);
                None
            }
        };

        let view = match self.store.all() {
            Ok(view) => view,
            Err(e) => {
                tracing::error!("Knowledge store unreadable: {}", e);
                return SearchResponse {
                    results: Vec::new(),
                    used_fallback: true,
                };
            }
        };

        let semantic = query_embedding.filter(|embedding| {
            let fits = view.dimensions().map_or(true, |dims| dims == embedding.len());
            if !fits {
                tracing::warn!(
                    "Query embedding has {} dimensions, store has {:?}; using keyword fallback",
                    embedding.len(),
                    view.dimensions()
                );
            }
            fits
        });

        let (hits, used_fallback) = match semantic {
            Some(embedding) => (
                search::search(view.iter(), &embedding, &filter, n_results, threshold),
                false,
            ),
            None if view.is_empty() && status == EngineStatus::Degraded => {
                tracing::debug!("Knowledge store is empty, ranking built-in knowledge");
                (
                    fallback::search(self.builtin_knowledge(), &options.query, &filter, n_results),
                    true,
                )
            }
            None => (
                fallback::search(
                    view.iter().map(|(document, _)| document),
                    &options.query,
                    &filter,
                    n_results,
                ),
                true,
            ),
        };

        SearchResponse {
            results: hits
                .into_iter()
                .map(|(document, score)| SearchResult::from_scored(document, score))
                .collect(),
            used_fallback,
        }
    }

    /// Add user knowledge and return its id.
    pub async fn add_knowledge(
        &self,
        content: &str,
        job_role: &str,
        content_type: &str,
    ) -> AppResult<String> {
        self.add_document(NewDocument::new(content, job_role, content_type))
            .await
            .map(|document| document.id)
    }

    /// Add a document with explicit provenance.
    ///
    /// # Errors
    /// * `AppError::IngestionUnavailable` - the engine is not ready or the embedder failed
    /// * `AppError::Validation` - empty content or tags
    /// * `AppError::DuplicateKnowledge` - near-identical knowledge already stored
    /// * `AppError::Storage` - persisted state lags memory after retry
    pub async fn add_document(&self, new: NewDocument) -> AppResult<Document> {
        let status = self.status();
        let embedder = match (&self.embedder, status) {
            (Some(embedder), EngineStatus::Ready) => embedder,
            _ => {
                return Err(AppError::IngestionUnavailable(format!(
                    "Knowledge engine is {}",
                    status
                )))
            }
        };

        let document = ingest::ingest(
            &self.store,
            embedder.as_ref(),
            new,
            self.config.duplicate_threshold,
        )
        .await?;

        tracing::info!(
            "Added knowledge '{}' for {} ({})",
            document.id,
            document.job_role,
            document.content_type
        );
        Ok(document)
    }

    /// Current status and store statistics.
    pub fn stats(&self) -> EngineStats {
        let (status, degraded_reason) = match self.lifecycle.read() {
            Ok(lifecycle) => (lifecycle.status, lifecycle.degraded_reason.clone()),
            Err(_) => (EngineStatus::Degraded, Some("Engine state lock poisoned".to_string())),
        };

        EngineStats {
            status,
            count: self.store.len(),
            dimensions: self.store.dimensions().unwrap_or(0),
            store_path: self.store.dir().to_path_buf(),
            embedder: self
                .embedder
                .as_ref()
                .map(|e| format!("{}/{}", e.provider_name(), e.model_name())),
            degraded_reason,
        }
    }

    /// Read-only view over every stored document and embedding.
    pub fn all(&self) -> AppResult<RecordsView<'_>> {
        self.store.all()
    }

    /// Delete all knowledge and persist the empty store.
    pub fn reset(&self) -> AppResult<()> {
        self.store.reset()
    }

    /// Flush persistence that an earlier failed save left pending.
    pub fn shutdown(&self) -> AppResult<()> {
        tracing::info!("Shutting down knowledge engine");
        self.store.flush()
    }

    pub fn status(&self) -> EngineStatus {
        self.lifecycle
            .read()
            .map(|lifecycle| lifecycle.status)
            .unwrap_or(EngineStatus::Degraded)
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    fn builtin_knowledge(&self) -> &[Document] {
        self.builtin.get_or_init(seed::builtin_documents)
    }

    fn begin_loading(&self) -> AppResult<()> {
        let mut lifecycle = self
            .lifecycle
            .write()
            .map_err(|e| AppError::Config(format!("Engine state lock poisoned: {}", e)))?;
        if lifecycle.status != EngineStatus::Uninitialized {
            return Err(AppError::Config(format!(
                "Knowledge engine cannot initialize while {}",
                lifecycle.status
            )));
        }
        lifecycle.status = EngineStatus::Loading;
        Ok(())
    }

    /// Embed a probe text and compare its length with the store's.
    async fn probe(&self, embedder: &dyn EmbeddingProvider) -> Result<(), String> {
        let embedding = embedder
            .embed(PROBE_TEXT)
            .await
            .map_err(|e| format!("Embedder probe failed: {}", e))?;

        if embedding.len() != embedder.dimensions() {
            return Err(format!(
                "Embedder '{}' produced {} dimensions, declared {}",
                embedder.provider_name(),
                embedding.len(),
                embedder.dimensions()
            ));
        }

        match self.store.dimensions() {
            Some(dims) if dims != embedding.len() => Err(format!(
                "Embedder produces {} dimensions but the store holds {}",
                embedding.len(),
                dims
            )),
            _ => Ok(()),
        }
    }

    fn degrade(&self, reason: String) -> EngineStatus {
        tracing::warn!("Knowledge engine degraded: {}", reason);
        self.set_status(EngineStatus::Degraded, Some(reason));
        EngineStatus::Degraded
    }

    fn set_status(&self, status: EngineStatus, degraded_reason: Option<String>) {
        match self.lifecycle.write() {
            Ok(mut lifecycle) => {
                lifecycle.status = status;
                lifecycle.degraded_reason = degraded_reason;
            }
            Err(e) => tracing::error!("Engine state lock poisoned: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use tempfile::TempDir;

    fn config(temp: &TempDir, seed_on_init: bool) -> KnowledgeConfig {
        KnowledgeConfig {
            store_path: temp.path().join("vector_db"),
            seed_on_init,
            ..Default::default()
        }
    }

    fn trigram() -> Option<Arc<dyn EmbeddingProvider>> {
        Some(Arc::new(TrigramProvider::new(128)))
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::new(config(&temp, false), trigram());
        assert_eq!(engine.status(), EngineStatus::Uninitialized);

        assert_eq!(engine.initialize().await.unwrap(), EngineStatus::Ready);
        assert_eq!(engine.stats().status, EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_repeated_initialize_is_rejected() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, false), trigram())
            .await
            .unwrap();

        assert!(matches!(engine.initialize().await, Err(AppError::Config(_))));
        assert_eq!(engine.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_missing_embedder_degrades() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, true), None).await.unwrap();

        let stats = engine.stats();
        assert_eq!(stats.status, EngineStatus::Degraded);
        assert!(stats.degraded_reason.is_some());
        assert_eq!(stats.count, 0);
        assert!(stats.embedder.is_none());
    }

    #[tokio::test]
    async fn test_degraded_empty_store_ranks_builtin_knowledge() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, true), None).await.unwrap();
        assert_eq!(engine.status(), EngineStatus::Degraded);

        let response = engine
            .semantic_search(
                &SearchOptions::new("quantify metrics")
                    .with_job_role("data_scientist")
                    .with_n_results(3),
            )
            .await;
        assert!(response.used_fallback);
        assert!(!response.results.is_empty());
        assert!(response.results.iter().all(|hit| hit.job_role == "data_scientist"));
        assert!(response.results[0].id.starts_with("builtin_"));

        // Nothing is written to the store
        assert_eq!(engine.stats().count, 0);
    }

    #[tokio::test]
    async fn test_ready_empty_store_does_not_use_builtin_knowledge() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, false), trigram())
            .await
            .unwrap();

        let response = engine.semantic_search(&SearchOptions::new("quantify metrics")).await;
        assert!(!response.used_fallback);
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_change_degrades() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, true), trigram())
            .await
            .unwrap();
        assert_eq!(engine.stats().dimensions, 128);
        engine.shutdown().unwrap();
        drop(engine);

        let smaller: Option<Arc<dyn EmbeddingProvider>> = Some(Arc::new(TrigramProvider::new(64)));
        let engine = KnowledgeEngine::open(config(&temp, true), smaller)
            .await
            .unwrap();
        assert_eq!(engine.status(), EngineStatus::Degraded);
        assert_eq!(engine.stats().count, 54);
    }

    #[tokio::test]
    async fn test_uninitialized_engine_refuses_ingestion() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::new(config(&temp, false), trigram());

        let result = engine
            .add_knowledge("Mention API design", "backend_developer", "career_tip")
            .await;
        assert!(matches!(result, Err(AppError::IngestionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_default_result_count_applies() {
        let temp = TempDir::new().unwrap();
        let engine = KnowledgeEngine::open(config(&temp, true), trigram())
            .await
            .unwrap();

        let response = engine
            .semantic_search(&SearchOptions::new("improve performance metrics"))
            .await;
        assert!(!response.used_fallback);
        assert_eq!(response.results.len(), engine.config().default_results);
    }
}
