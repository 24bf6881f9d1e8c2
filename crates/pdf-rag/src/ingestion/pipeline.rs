//! Ingestion pipeline orchestration
//!
//! One document moves `Received -> Chunked -> Embedded -> Indexed -> Complete`
//! or ends in `Failed`. Nothing reaches the index until every chunk has a
//! vector, and the records are then written in one batch.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::{embed_with_timeout, EmbeddingProvider};
use crate::retrieval::VectorIndex;
use crate::types::{Chunk, IndexRecord};

use super::chunker::WordChunker;

/// Lifecycle of one document ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    Chunked,
    Embedded,
    Indexed,
    Complete,
    Failed(String),
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::Chunked => write!(f, "chunked"),
            Self::Embedded => write!(f, "embedded"),
            Self::Indexed => write!(f, "indexed"),
            Self::Complete => write!(f, "complete"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub chunk_count: usize,
}

/// Stage tracker for one document
struct IngestRun<'a> {
    document_id: &'a str,
    stage: IngestStage,
}

impl<'a> IngestRun<'a> {
    fn new(document_id: &'a str) -> Self {
        tracing::debug!("[{}] {}", document_id, IngestStage::Received);
        Self {
            document_id,
            stage: IngestStage::Received,
        }
    }

    fn advance(&mut self, next: IngestStage) {
        tracing::debug!("[{}] {} -> {}", self.document_id, self.stage, next);
        self.stage = next;
    }

    /// Move to `Failed` and hand the error back to the caller
    fn fail(&mut self, error: Error) -> Error {
        tracing::error!("[{}] failed while {}: {}", self.document_id, self.stage, error);
        self.stage = IngestStage::Failed(error.to_string());
        error
    }
}

/// Chunk, embed and index one document at a time
pub struct IngestPipeline {
    chunker: WordChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    workers: usize,
    embed_timeout: Duration,
}

impl IngestPipeline {
    /// Create a pipeline; the provider and index must agree on dimension
    pub fn new(
        chunker: WordChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        workers: usize,
        embed_timeout: Duration,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(Error::Config(format!(
                "embedding provider {} produces {} dimensions but index {} stores {}",
                embedder.name(),
                embedder.dimensions(),
                index.name(),
                index.dimensions()
            )));
        }
        Ok(Self {
            chunker,
            embedder,
            index,
            workers: workers.max(1),
            embed_timeout,
        })
    }

    pub fn chunker(&self) -> &WordChunker {
        &self.chunker
    }

    /// Ingest extracted text under `document_id`
    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<IngestReport> {
        validate_document_id(document_id)?;
        let mut run = IngestRun::new(document_id);

        let chunks: Vec<Chunk> = self
            .chunker
            .chunk(text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk::new(document_id, ordinal, text))
            .collect();
        if chunks.is_empty() {
            return Err(run.fail(Error::input("empty or unchunkable text")));
        }
        tracing::info!("[{}] Created {} chunks", document_id, chunks.len());
        run.advance(IngestStage::Chunked);

        // An already ingested document would only fail at upsert; skip the embedding cost
        let first_id = &chunks[0].id;
        match self.index.contains(first_id).await {
            Ok(false) => {}
            Ok(true) => return Err(run.fail(Error::DuplicateId(first_id.clone()))),
            Err(e) => return Err(run.fail(e)),
        }

        let vectors = match self.embed_all(&chunks).await {
            Ok(vectors) => vectors,
            Err(e) => return Err(run.fail(e)),
        };
        run.advance(IngestStage::Embedded);

        let chunk_count = chunks.len();
        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.into_record(vector))
            .collect();
        if let Err(e) = self.index.upsert(records).await {
            return Err(run.fail(e));
        }
        run.advance(IngestStage::Indexed);

        run.advance(IngestStage::Complete);
        tracing::info!(
            "[{}] COMPLETE: {} chunks stored in {}",
            document_id,
            chunk_count,
            self.index.name()
        );

        Ok(IngestReport {
            document_id: document_id.to_string(),
            chunk_count,
        })
    }

    /// Embed every chunk with bounded concurrency, returning vectors in ordinal order
    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let total = chunks.len();
        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| self.embed_chunk(chunk, total))
            .collect();
        stream::iter(pending)
            .buffered(self.workers)
            .try_collect()
            .await
    }

    async fn embed_chunk(&self, chunk: &Chunk, total: usize) -> Result<Vec<f32>> {
        let vector = embed_with_timeout(self.embedder.as_ref(), &chunk.text, self.embed_timeout)
            .await
            .map_err(|e| match e {
                Error::Embedding(detail) => {
                    Error::Embedding(format!("chunk {}: {}", chunk.ordinal, detail))
                }
                other => other,
            })?;

        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(Error::embedding(format!(
                "chunk {}: expected {} dimensions, got {}",
                chunk.ordinal,
                expected,
                vector.len()
            )));
        }

        tracing::debug!(
            "[{}] Generated embedding for chunk {}/{}",
            chunk.source_document,
            chunk.ordinal + 1,
            total
        );
        Ok(vector)
    }
}

/// Document ids namespace record ids, so they must be non-empty and free of `:`
pub fn validate_document_id(document_id: &str) -> Result<()> {
    if document_id.trim().is_empty() {
        return Err(Error::input("document id must not be empty"));
    }
    if document_id.contains(':') {
        return Err(Error::input(format!(
            "document id {:?} must not contain ':'",
            document_id
        )));
    }
    Ok(())
}
