//! The two core entry points, wired over shared providers and one index

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::{QueryOutcome, QueryPipeline};
use crate::ingestion::{IngestPipeline, IngestReport, WordChunker};
use crate::providers::{self, EmbeddingProvider, LlmProvider};
use crate::retrieval::{SqliteVectorIndex, VectorIndex};

/// Ingestion and question answering over injected collaborators
pub struct RagService {
    ingest: IngestPipeline,
    query: QueryPipeline,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
}

impl RagService {
    /// Build both pipelines over the given collaborators
    pub fn new(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let processing = &config.processing;
        let chunker = WordChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;

        let ingest = IngestPipeline::new(
            chunker,
            Arc::clone(&embedder),
            Arc::clone(&index),
            processing.embedding_workers(),
            processing.embed_timeout(),
        )?;
        let query = QueryPipeline::new(Arc::clone(&embedder), Arc::clone(&index), Arc::clone(&llm))
            .with_top_k(config.retrieval.top_k)
            .with_max_tokens(config.llm.max_tokens)
            .with_timeouts(processing.embed_timeout(), processing.synthesis_timeout());

        Ok(Self {
            ingest,
            query,
            embedder,
            llm,
            index,
        })
    }

    /// Wire the configured backend and the durable SQLite index
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let (embedder, llm) = providers::from_config(config)?;
        let index = SqliteVectorIndex::open(
            &config.vector_db.storage_path,
            &config.vector_db.collection,
            config.embeddings.dimensions,
        )?;
        tracing::info!(
            "Vector index: collection {} at {}",
            config.vector_db.collection,
            config.vector_db.storage_path.display()
        );
        Self::new(config, embedder, llm, Arc::new(index))
    }

    /// Ingest extracted document text
    pub async fn ingest_document(&self, document_id: &str, text: &str) -> Result<IngestReport> {
        self.ingest.ingest(document_id, text).await
    }

    /// Answer a question from the indexed documents
    pub async fn answer_question(&self, question: &str) -> Result<QueryOutcome> {
        self.query.answer(question).await
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::generation::FALLBACK_ANSWER;
    use crate::retrieval::MemoryVectorIndex;
    use crate::testing::{HashEmbedder, RecordingLlm};

    fn service(config: &RagConfig) -> Result<RagService> {
        let dims = config.embeddings.dimensions;
        RagService::new(
            config,
            Arc::new(HashEmbedder::new(dims)),
            Arc::new(RecordingLlm::answering("42")),
            Arc::new(MemoryVectorIndex::new(dims)),
        )
    }

    #[tokio::test]
    async fn test_ingest_then_answer() {
        let mut config = RagConfig::default();
        config.embeddings.dimensions = 32;
        let service = service(&config).unwrap();

        assert_eq!(
            service.answer_question("meaning?").await.unwrap().answer,
            FALLBACK_ANSWER
        );

        let report = service
            .ingest_document("guide.pdf", "the meaning of life is forty two")
            .await
            .unwrap();
        assert_eq!(report.chunk_count, 1);

        let outcome = service.answer_question("meaning of life").await.unwrap();
        assert_eq!(outcome.answer, "42");
        assert_eq!(outcome.chunks_retrieved, 1);
        assert_eq!(service.index().len().await.unwrap(), 1);
    }

    #[test]
    fn test_bad_chunking_config_fails_fast() {
        let mut config = RagConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(service(&config), Err(Error::Input(_))));
    }

    #[tokio::test]
    async fn test_from_config_opens_durable_index() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::for_backend(crate::config::BackendProvider::Ollama);
        config.vector_db.storage_path = dir.path().join("vectors.db");

        let service = RagService::from_config(&config).unwrap();
        assert_eq!(service.index().name(), "sqlite");
        assert_eq!(service.embedder().dimensions(), 768);
        assert_eq!(service.llm().name(), "ollama");
    }
}
