//! Knowledge ingestion: validate, embed, then append.
//!
//! Embedding happens before the store lock is taken so slow model calls
//! never block readers or other writers.

use crate::embeddings::EmbeddingProvider;
use crate::search;
use crate::store::{RecordStore, Records};
use crate::types::{normalize_tag, Document, NewDocument, TagFilter};
use mentor_core::{AppError, AppResult};

/// Check and normalize a document before it is embedded.
pub fn validate(new: NewDocument) -> AppResult<NewDocument> {
    let content = new.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Knowledge content must not be empty".to_string(),
        ));
    }

    let job_role = normalize_tag(&new.job_role);
    if job_role.is_empty() {
        return Err(AppError::Validation("Job role must not be empty".to_string()));
    }

    let content_type = normalize_tag(&new.content_type);
    if content_type.is_empty() {
        return Err(AppError::Validation(
            "Content type must not be empty".to_string(),
        ));
    }

    Ok(NewDocument {
        content: content.to_string(),
        job_role,
        content_type,
        source: new.source,
    })
}

/// Validate, embed and append a single document.
///
/// # Errors
/// * `AppError::Validation` - empty content or tags
/// * `AppError::IngestionUnavailable` - the embedder failed
/// * `AppError::DuplicateKnowledge` - near-identical knowledge already stored
/// * `AppError::Storage` - the append could not be persisted
pub async fn ingest(
    store: &RecordStore,
    embedder: &dyn EmbeddingProvider,
    new: NewDocument,
    duplicate_threshold: Option<f32>,
) -> AppResult<Document> {
    let new = validate(new)?;
    let embedding = embed_one(embedder, &new.content).await?;

    let filter = TagFilter::new(Some(&new.job_role), Some(&new.content_type));
    let probe = embedding.clone();

    store.append_if(new, embedding, |records| match duplicate_threshold {
        Some(threshold) => reject_duplicate(records, &filter, &probe, threshold),
        None => Ok(()),
    })
}

/// Validate, embed and append many documents with one persistence flush.
/// Nothing is appended unless every document validates and embeds.
pub async fn ingest_batch(
    store: &RecordStore,
    embedder: &dyn EmbeddingProvider,
    batch: Vec<NewDocument>,
) -> AppResult<Vec<Document>> {
    let batch = batch
        .into_iter()
        .map(validate)
        .collect::<AppResult<Vec<_>>>()?;
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = batch.iter().map(|doc| doc.content.clone()).collect();
    let embeddings = embedder
        .embed_batch(&texts)
        .await
        .map_err(unavailable)?;

    if embeddings.len() != batch.len() {
        return Err(AppError::IngestionUnavailable(format!(
            "Embedder returned {} embeddings for {} documents",
            embeddings.len(),
            batch.len()
        )));
    }
    for embedding in &embeddings {
        check_length(embedder, embedding)?;
    }

    let documents = store.append_batch(batch.into_iter().zip(embeddings).collect())?;
    tracing::info!("Ingested {} documents in one batch", documents.len());
    Ok(documents)
}

async fn embed_one(embedder: &dyn EmbeddingProvider, content: &str) -> AppResult<Vec<f32>> {
    let embedding = embedder.embed(content).await.map_err(unavailable)?;
    check_length(embedder, &embedding)?;
    Ok(embedding)
}

fn check_length(embedder: &dyn EmbeddingProvider, embedding: &[f32]) -> AppResult<()> {
    if embedding.len() != embedder.dimensions() {
        return Err(AppError::IngestionUnavailable(format!(
            "Embedder '{}' returned {} dimensions, expected {}",
            embedder.provider_name(),
            embedding.len(),
            embedder.dimensions()
        )));
    }
    Ok(())
}

fn unavailable(err: AppError) -> AppError {
    match err {
        AppError::EmbeddingUnavailable(reason) => AppError::IngestionUnavailable(reason),
        other => AppError::IngestionUnavailable(other.to_string()),
    }
}

fn reject_duplicate(
    records: Records<'_>,
    filter: &TagFilter,
    embedding: &[f32],
    threshold: f32,
) -> AppResult<()> {
    let best = search::search(records.iter(), embedding, filter, 1, None);
    match best.first() {
        Some((existing, score)) if *score > threshold => {
            tracing::warn!(
                "Rejected knowledge as duplicate of '{}' (score {:.3})",
                existing.id,
                score
            );
            Err(AppError::DuplicateKnowledge {
                existing_id: existing.id.clone(),
                score: *score,
            })
        }
        _ => Ok(()),
    }
}
