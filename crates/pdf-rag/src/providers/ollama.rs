//! Ollama providers for embeddings and chat answers
//!
//! One `OllamaClient` is shared by both providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{LlmProvider, SynthesisRequest};
use super::{is_transient_error, is_transient_status, retry_with_backoff, Attempt};

/// Ollama API client with automatic retry
pub struct OllamaClient {
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            generate_model: config.generate_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }
        let url = format!("{}/api/embeddings", self.base_url);
        let url = url.as_str();

        retry_with_backoff(self.max_retries, || async move {
            let request = EmbedRequest {
                model: &self.embed_model,
                prompt: text,
            };

            let response = match self.client.post(url).json(&request).send().await {
                Ok(response) => response,
                Err(e) if is_transient_error(&e) => {
                    return Attempt::Retry(Error::embedding(format!("request failed: {}", e)))
                }
                Err(e) => return Attempt::Done(Err(Error::embedding(format!("request failed: {}", e)))),
            };

            let status = response.status();
            if !status.is_success() {
                let err = Error::embedding(format!("HTTP {}", status));
                return if is_transient_status(status) {
                    Attempt::Retry(err)
                } else {
                    Attempt::Done(Err(err))
                };
            }

            let parsed = response
                .json::<EmbedResponse>()
                .await
                .map(|r| r.embedding)
                .map_err(|e| Error::embedding(format!("malformed response: {}", e)));
            Attempt::Done(parsed)
        })
        .await
    }

    /// Run one non-streaming chat exchange with retry
    pub async fn chat(&self, request: &SynthesisRequest<'_>, temperature: f32) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let url = url.as_str();
        let user = request.user_message();
        let user = user.as_str();

        tracing::info!("Generating answer with model: {}", self.generate_model);

        retry_with_backoff(self.max_retries, || async move {
            let body = ChatRequest {
                model: &self.generate_model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: request.system,
                    },
                    ChatMessage {
                        role: "user",
                        content: user,
                    },
                ],
                stream: false,
                options: ChatOptions {
                    temperature,
                    num_predict: request.max_tokens,
                },
            };

            let response = match self.client.post(url).json(&body).send().await {
                Ok(response) => response,
                Err(e) if is_transient_error(&e) => {
                    return Attempt::Retry(Error::synthesis(format!("request failed: {}", e)))
                }
                Err(e) => return Attempt::Done(Err(Error::synthesis(format!("request failed: {}", e)))),
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let err = Error::synthesis(format!("HTTP {} - {}", status, body));
                return if is_transient_status(status) {
                    Attempt::Retry(err)
                } else {
                    Attempt::Done(Err(err))
                };
            }

            let parsed = response
                .json::<ChatResponse>()
                .await
                .map_err(|e| Error::synthesis(format!("malformed response: {}", e)))
                .and_then(|r| {
                    r.message
                        .map(|m| m.content)
                        .ok_or_else(|| Error::synthesis("malformed response: no message"))
                });
            Attempt::Done(parsed)
        })
        .await
    }

    pub fn generate_model(&self) -> &str {
        &self.generate_model
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    pub fn new(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    temperature: f32,
}

impl OllamaLlm {
    pub fn new(client: Arc<OllamaClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn complete(&self, request: &SynthesisRequest<'_>) -> Result<String> {
        self.client.chat(request, self.temperature).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        self.client.generate_model()
    }
}
