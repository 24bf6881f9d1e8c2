//! Embedding provider trait for generating text embeddings

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};

/// Trait for generating text embeddings
///
/// Implementations:
/// - `OpenAiEmbedder`: OpenAI embeddings API (text-embedding-ada-002)
/// - `OllamaEmbedder`: Local Ollama server (nomic-embed-text)
///
/// Every call is a fallible network round trip; callers bound it with a timeout.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for a single text. Empty text is an `Error::Embedding`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Fixed output dimension of this provider
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

/// Embed with a bounded wait. Timeouts and non-embedding failures surface
/// as `Error::Embedding`.
pub async fn embed_with_timeout(
    embedder: &dyn EmbeddingProvider,
    text: &str,
    limit: Duration,
) -> Result<Vec<f32>> {
    match tokio::time::timeout(limit, embedder.embed(text)).await {
        Ok(Ok(vector)) => Ok(vector),
        Ok(Err(e @ Error::Embedding(_))) => Err(e),
        Ok(Err(e)) => Err(Error::embedding(e.to_string())),
        Err(_) => Err(Error::embedding(format!(
            "{} timed out after {}s",
            embedder.name(),
            limit.as_secs_f64()
        ))),
    }
}
