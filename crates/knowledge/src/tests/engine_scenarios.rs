//! End-to-end engine behavior: lifecycle, persistence, fallback and ingestion.

use super::{SwitchableProvider, UnavailableProvider};
use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::engine::KnowledgeEngine;
use crate::store::persist;
use crate::store::RecordStore;
use crate::types::{EngineStatus, NewDocument, SearchOptions, SearchResponse, SOURCE_INITIAL};
use mentor_core::{AppError, KnowledgeConfig};
use std::sync::Arc;
use tempfile::TempDir;

const DIMS: usize = 128;

fn config(temp: &TempDir, seed_on_init: bool) -> KnowledgeConfig {
    KnowledgeConfig {
        store_path: temp.path().join("vector_db"),
        seed_on_init,
        ..Default::default()
    }
}

fn trigram() -> Option<Arc<dyn EmbeddingProvider>> {
    Some(Arc::new(TrigramProvider::new(DIMS)))
}

async fn seeded(temp: &TempDir) -> KnowledgeEngine {
    KnowledgeEngine::open(config(temp, true), trigram())
        .await
        .unwrap()
}

fn assert_aligned(engine: &KnowledgeEngine) {
    let count = engine.stats().count;
    let view = engine.all().unwrap();
    let dims = view.dimensions().unwrap_or(0);
    assert_eq!(view.iter().count(), count);
    assert!(view.iter().all(|(_, embedding)| embedding.len() == dims));
}

#[tokio::test]
async fn test_fresh_store_is_seeded_once() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let stats = engine.stats();
    assert_eq!(stats.status, EngineStatus::Ready);
    assert_eq!(stats.count, 54);
    assert_eq!(stats.dimensions, DIMS);
    assert_eq!(stats.embedder.as_deref(), Some("trigram/trigram-v1"));
    assert!(engine
        .all()
        .unwrap()
        .iter()
        .all(|(doc, _)| doc.source == SOURCE_INITIAL));
    drop(engine);

    // Reopening restores instead of seeding again
    let engine = seeded(&temp).await;
    assert_eq!(engine.stats().count, 54);
}

#[tokio::test]
async fn test_documents_and_embeddings_stay_aligned() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;
    assert_aligned(&engine);

    engine
        .add_knowledge("Mention open source contributions", "backend_developer", "career_tip")
        .await
        .unwrap();
    assert_aligned(&engine);

    let _ = engine.add_knowledge("   ", "backend_developer", "career_tip").await;
    assert_aligned(&engine);

    engine.reset().unwrap();
    assert_aligned(&engine);
}

#[tokio::test]
async fn test_repeated_search_is_identical() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;
    let options = SearchOptions::new("improve API response times").with_n_results(10);

    let first = engine.semantic_search(&options).await;
    let second = engine.semantic_search(&options).await;

    assert!(!first.used_fallback);
    assert_eq!(first, second);
    let bits = |r: &SearchResponse| {
        r.results
            .iter()
            .map(|hit| hit.score.to_bits())
            .collect::<Vec<_>>()
    };
    assert_eq!(bits(&first), bits(&second));
}

#[tokio::test]
async fn test_scores_bounded_and_ordered() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let response = engine
        .semantic_search(&SearchOptions::new("user research").with_n_results(54))
        .await;
    assert_eq!(response.results.len(), 54);

    let sequence_of = |id: &str| -> u64 { id.trim_start_matches("doc_").parse().unwrap() };
    for pair in response.results.windows(2) {
        assert!((-1.0..=1.0).contains(&pair[0].score));
        assert!(pair[0].score >= pair[1].score);
        if pair[0].score == pair[1].score {
            assert!(sequence_of(&pair[0].id) < sequence_of(&pair[1].id));
        }
    }
}

#[tokio::test]
async fn test_round_trip_preserves_store() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;
    engine
        .add_knowledge("Show mentoring of junior engineers", "backend_developer", "career_tip")
        .await
        .unwrap();

    let before: Vec<_> = engine
        .all()
        .unwrap()
        .iter()
        .map(|(doc, emb)| (doc.clone(), emb.to_vec()))
        .collect();
    engine.shutdown().unwrap();
    drop(engine);

    let reopened = RecordStore::load(temp.path().join("vector_db")).unwrap();
    let after: Vec<_> = reopened
        .all()
        .unwrap()
        .iter()
        .map(|(doc, emb)| (doc.clone(), emb.to_vec()))
        .collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_add_knowledge_grows_store_by_one() {
    let temp = TempDir::new().unwrap();
    let engine = KnowledgeEngine::open(config(&temp, false), trigram())
        .await
        .unwrap();
    let before = engine.stats().count;

    let id = engine
        .add_knowledge("Highlight cross-functional collaboration", "product_manager", "career_tip")
        .await
        .unwrap();

    assert_eq!(engine.stats().count, before + 1);
    let view = engine.all().unwrap();
    let (doc, _) = view.get(&id).unwrap();
    assert_eq!(doc.content, "Highlight cross-functional collaboration");
    assert_eq!(doc.job_role, "product_manager");
}

#[tokio::test]
async fn test_embedder_failure_falls_back_to_keywords() {
    let temp = TempDir::new().unwrap();
    let provider = Arc::new(SwitchableProvider::new(DIMS));
    let embedder: Arc<dyn EmbeddingProvider> = provider.clone();
    let engine = KnowledgeEngine::open(config(&temp, true), Some(embedder))
        .await
        .unwrap();
    engine
        .add_knowledge("Show leadership of cross-functional teams", "product_manager", "career_tip")
        .await
        .unwrap();

    provider.set_available(false);
    let response = engine
        .semantic_search(&SearchOptions::new("leadership").with_n_results(3))
        .await;

    assert!(response.used_fallback);
    assert!(!response.results.is_empty());
    assert!(response.results.len() <= 3);
    assert!(response.results[0].content.contains("leadership"));

    // Query-time failures do not change the lifecycle
    assert_eq!(engine.status(), EngineStatus::Ready);

    // Ingestion cannot proceed without embeddings
    let err = engine
        .add_knowledge("Mention stakeholder alignment", "product_manager", "career_tip")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IngestionUnavailable(_)));

    provider.set_available(true);
    let response = engine
        .semantic_search(&SearchOptions::new("leadership").with_n_results(3))
        .await;
    assert!(!response.used_fallback);
}

#[tokio::test]
async fn test_unavailable_embedder_starts_degraded() {
    let temp = TempDir::new().unwrap();
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(UnavailableProvider);
    let engine = KnowledgeEngine::open(config(&temp, true), Some(embedder))
        .await
        .unwrap();

    assert_eq!(engine.status(), EngineStatus::Degraded);
    assert!(engine.stats().degraded_reason.unwrap().contains("probe"));

    // Nothing was seeded, so the built-in corpus answers
    let response = engine
        .semantic_search(&SearchOptions::new("quantify metrics").with_n_results(3))
        .await;
    assert!(response.used_fallback);
    assert!(!response.results.is_empty());
    assert!(response.results.len() <= 3);
    assert!(response.results[0].content.to_lowercase().contains("metrics"));
    assert_eq!(engine.stats().count, 0);

    let err = engine
        .add_knowledge("Show leadership", "product_manager", "career_tip")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IngestionUnavailable(_)));
}

#[tokio::test]
async fn test_corrupt_store_degrades_without_overwriting() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("vector_db");
    {
        let engine = KnowledgeEngine::open(config(&temp, false), trigram())
            .await
            .unwrap();
        for i in 0..5 {
            engine
                .add_knowledge(
                    &format!("Leadership lesson number {}", i),
                    "product_manager",
                    &format!("lesson_{}", i),
                )
                .await
                .unwrap();
        }
    }

    // Commit a generation whose matrix is one row short
    let store = RecordStore::load(&store_dir).unwrap();
    let view = store.all().unwrap();
    let documents: Vec<_> = view.iter().map(|(doc, _)| doc.clone()).collect();
    let rows: Vec<f32> = view.iter().take(4).flat_map(|(_, emb)| emb.to_vec()).collect();
    let documents_bytes = serde_json::to_vec(&documents).unwrap();
    let matrix_bytes = persist::encode_matrix(4, DIMS, &rows);
    persist::write_generation(&store_dir, 99, &documents_bytes, &matrix_bytes, 5, DIMS, 5).unwrap();
    drop(view);

    let err = RecordStore::load(&store_dir).unwrap_err();
    assert!(matches!(err, AppError::StoreCorruption(_)));

    let engine = KnowledgeEngine::open(config(&temp, true), trigram())
        .await
        .unwrap();
    let stats = engine.stats();
    assert_eq!(stats.status, EngineStatus::Degraded);
    assert_eq!(stats.count, 0);

    let response = engine
        .semantic_search(&SearchOptions::new("quantify metrics"))
        .await;
    assert!(response.used_fallback);
    assert!(!response.results.is_empty());
    assert!(response.results.iter().all(|hit| hit.id.starts_with("builtin_")));

    engine.shutdown().unwrap();
    assert!(matches!(
        RecordStore::load(&store_dir),
        Err(AppError::StoreCorruption(_))
    ));
}

#[tokio::test]
async fn test_role_filter_is_respected() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    for options in [
        SearchOptions::new("machine learning models").with_job_role("data_scientist"),
        SearchOptions::new("improve engagement metrics")
            .with_job_role("Data Scientist")
            .with_n_results(20),
    ] {
        let response = engine.semantic_search(&options).await;
        assert!(!response.results.is_empty());
        assert!(response
            .results
            .iter()
            .all(|hit| hit.job_role == "data_scientist"));
    }
}

#[tokio::test]
async fn test_content_type_filter_composes_with_role() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let response = engine
        .semantic_search(
            &SearchOptions::new("campaign results")
                .with_job_role("marketing_specialist")
                .with_content_type("resume_example")
                .with_n_results(10),
        )
        .await;

    assert_eq!(response.results.len(), 4);
    assert!(response
        .results
        .iter()
        .all(|hit| hit.job_role == "marketing_specialist" && hit.content_type == "resume_example"));
}

#[tokio::test]
async fn test_threshold_limits_results() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let response = engine
        .semantic_search(
            &SearchOptions::new("Focus on system architecture and scalability achievements")
                .with_threshold(0.99),
        )
        .await;

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].job_role, "backend_developer");
}

#[tokio::test]
async fn test_duplicate_knowledge_is_rejected() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let err = engine
        .add_knowledge(
            "Highlight cross-functional collaboration and stakeholder management",
            "Product Manager",
            "career_tip",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DuplicateKnowledge { .. }));
    assert_eq!(engine.stats().count, 54);
}

#[tokio::test]
async fn test_invalid_input_leaves_store_untouched() {
    let temp = TempDir::new().unwrap();
    let engine = seeded(&temp).await;

    let err = engine
        .add_knowledge(" \t ", "product_manager", "career_tip")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(engine.stats().count, 54);
}

#[tokio::test]
async fn test_storage_failure_keeps_knowledge_in_memory() {
    let temp = TempDir::new().unwrap();
    let engine = KnowledgeEngine::open(config(&temp, false), trigram())
        .await
        .unwrap();
    assert_eq!(engine.status(), EngineStatus::Ready);

    // A regular file where the store directory should be
    std::fs::write(temp.path().join("vector_db"), b"file").unwrap();

    let err = engine
        .add_document(NewDocument::new("Kept in memory", "ux_designer", "career_tip"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert_eq!(engine.stats().count, 1);

    let response = engine
        .semantic_search(&SearchOptions::new("Kept in memory"))
        .await;
    assert_eq!(response.results.len(), 1);

    assert!(matches!(engine.shutdown(), Err(AppError::Storage(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_searches_never_observe_partial_appends() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(seeded(&temp).await);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 0..20 {
                engine
                    .add_knowledge(
                        &format!("Concurrent tip {} about release engineering", i),
                        "backend_developer",
                        &format!("note_{}", i),
                    )
                    .await
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                for _ in 0..25 {
                    let response = engine
                        .semantic_search(&SearchOptions::new("release engineering").with_n_results(10))
                        .await;
                    assert!(!response.used_fallback);
                    assert!(!response.results.is_empty());
                    assert!(response.results.len() <= 10);
                    for pair in response.results.windows(2) {
                        assert!(pair[0].score >= pair[1].score);
                    }

                    {
                        let view = engine.all().unwrap();
                        let dims = view.dimensions().unwrap();
                        assert_eq!(view.iter().count(), view.len());
                        assert!(view.iter().all(|(_, embedding)| embedding.len() == dims));
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert_eq!(engine.stats().count, 74);
    assert_aligned(&engine);
}
