//! Provider abstractions for embeddings and answer synthesis
//!
//! Trait-based so the pipelines can switch between OpenAI and a local Ollama
//! server, or take test doubles.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::time::sleep;

use crate::config::{BackendProvider, RagConfig};
use crate::error::Result;

pub use embedding::{embed_with_timeout, EmbeddingProvider};
pub use llm::{LlmProvider, SynthesisRequest};
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaLlm};
pub use openai::{OpenAiClient, OpenAiEmbedder, OpenAiLlm};

/// Build the embedding and LLM providers selected by the configuration
pub fn from_config(
    config: &RagConfig,
) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>)> {
    let dimensions = config.embeddings.dimensions;
    match config.backend {
        BackendProvider::OpenAi => {
            let client = Arc::new(OpenAiClient::new(&config.llm)?);
            Ok((
                Arc::new(OpenAiEmbedder::new(Arc::clone(&client), dimensions)),
                Arc::new(OpenAiLlm::new(client, config.llm.temperature)),
            ))
        }
        BackendProvider::Ollama => {
            let client = Arc::new(OllamaClient::new(&config.llm)?);
            Ok((
                Arc::new(OllamaEmbedder::new(Arc::clone(&client), dimensions)),
                Arc::new(OllamaLlm::new(client, config.llm.temperature)),
            ))
        }
    }
}

/// Outcome of one HTTP attempt, telling the retry loop whether to try again
pub(crate) enum Attempt<T> {
    Done(Result<T>),
    Retry(crate::error::Error),
}

/// Whether a response status is worth retrying
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Whether a transport error is worth retrying
pub(crate) fn is_transient_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Retry an operation with exponential backoff (1s, 2s, 4s, ...)
pub(crate) async fn retry_with_backoff<F, Fut, T>(max_retries: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Attempt::Done(result) => return result,
            Attempt::Retry(err) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "Request failed (attempt {}/{}): {}, retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    err,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Attempt::Retry(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(2, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Attempt::Retry(Error::embedding("429"))
                } else {
                    Attempt::Done(Ok(n))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Retry(Error::synthesis("503")) }
        })
        .await;
        assert!(matches!(result, Err(Error::Synthesis(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Done(Err(Error::embedding("401"))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transient_status() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }
}
