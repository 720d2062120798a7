//! Cross-module tests and test-only embedders.

mod engine_scenarios;

use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use mentor_core::{AppError, AppResult};
use std::sync::atomic::{AtomicBool, Ordering};

/// Embedder that always fails.
#[derive(Debug)]
pub(crate) struct UnavailableProvider;

#[async_trait]
impl EmbeddingProvider for UnavailableProvider {
    fn provider_name(&self) -> &str {
        "unavailable"
    }

    fn model_name(&self) -> &str {
        "none"
    }

    fn dimensions(&self) -> usize {
        16
    }

    async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Err(AppError::EmbeddingUnavailable(
            "model failed to load".to_string(),
        ))
    }
}

/// Trigram embedder that can be switched off mid-test.
#[derive(Debug)]
pub(crate) struct SwitchableProvider {
    inner: TrigramProvider,
    available: AtomicBool,
}

impl SwitchableProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            inner: TrigramProvider::new(dimensions),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for SwitchableProvider {
    fn provider_name(&self) -> &str {
        "switchable"
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AppError::EmbeddingUnavailable("switched off".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}
