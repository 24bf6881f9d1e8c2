//! Question answering: embed, retrieve, assemble context, synthesize

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::providers::{embed_with_timeout, EmbeddingProvider, LlmProvider};
use crate::retrieval::VectorIndex;

use super::prompt::{PromptBuilder, FALLBACK_ANSWER};

/// Answer plus how many chunks backed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub answer: String,
    pub chunks_retrieved: usize,
}

impl QueryOutcome {
    /// Whether the fallback answer was returned
    pub fn is_fallback(&self) -> bool {
        self.chunks_retrieved == 0
    }
}

/// Retrieval-augmented answering over a shared index
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LlmProvider>,
    prompt: PromptBuilder,
    top_k: usize,
    embed_timeout: Duration,
    synthesis_timeout: Duration,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            prompt: PromptBuilder::default(),
            top_k: 3,
            embed_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.prompt = PromptBuilder::new(max_tokens);
        self
    }

    pub fn with_timeouts(mut self, embed: Duration, synthesis: Duration) -> Self {
        self.embed_timeout = embed;
        self.synthesis_timeout = synthesis;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer a question from the indexed documents
    ///
    /// An index with no matches yields the fallback answer, not an error.
    pub async fn answer(&self, question: &str) -> Result<QueryOutcome> {
        if question.trim().is_empty() {
            return Err(Error::input("question must not be empty"));
        }

        let vector = embed_with_timeout(self.embedder.as_ref(), question, self.embed_timeout).await?;
        let expected = self.embedder.dimensions();
        if vector.len() != expected {
            return Err(Error::embedding(format!(
                "question: expected {} dimensions, got {}",
                expected,
                vector.len()
            )));
        }
        let result = self.index.query(&vector, self.top_k).await?;

        if result.is_empty() {
            tracing::info!("No indexed context for question, returning fallback answer");
            return Ok(QueryOutcome {
                answer: FALLBACK_ANSWER.to_string(),
                chunks_retrieved: 0,
            });
        }

        if let Some(top) = result.top() {
            tracing::debug!(
                "Retrieved {} chunks, best {} ({:.3})",
                result.len(),
                top.id,
                top.score
            );
        }

        let context = PromptBuilder::build_context(&result);
        let request = self.prompt.request(&context, question);

        let answer = match tokio::time::timeout(self.synthesis_timeout, self.llm.complete(&request)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e @ Error::Synthesis(_))) => return Err(e),
            Ok(Err(e)) => return Err(Error::synthesis(e.to_string())),
            Err(_) => {
                return Err(Error::synthesis(format!(
                    "{} timed out after {}s",
                    self.llm.model(),
                    self.synthesis_timeout.as_secs_f64()
                )))
            }
        };

        Ok(QueryOutcome {
            answer,
            chunks_retrieved: result.len(),
        })
    }
}
