//! OpenAI providers for embeddings and chat-completion answers

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{LlmProvider, SynthesisRequest};
use super::{is_transient_error, is_transient_status, retry_with_backoff, Attempt};

/// Shared OpenAI HTTP client
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    embed_model: String,
    generate_model: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

impl OpenAiClient {
    /// Build a client with bearer auth and the configured request timeout
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key not configured".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| Error::Config("Invalid OpenAI API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build OpenAI HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            generate_model: config.generate_model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Embed one text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::embedding("cannot embed empty text"));
        }
        let url = format!("{}/embeddings", self.base_url);
        let url = url.as_str();

        retry_with_backoff(self.max_retries, || async move {
            let request = EmbeddingRequest {
                model: &self.embed_model,
                input: text,
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
                let body = response.text().await.unwrap_or_default();
                let err = Error::embedding(format!("HTTP {} - {}", status, body));
                return if is_transient_status(status) {
                    Attempt::Retry(err)
                } else {
                    Attempt::Done(Err(err))
                };
            }

            let parsed = response
                .json::<EmbeddingResponse>()
                .await
                .map_err(|e| Error::embedding(format!("malformed response: {}", e)))
                .and_then(|r| {
                    r.data
                        .into_iter()
                        .next()
                        .map(|d| d.embedding)
                        .ok_or_else(|| Error::embedding("malformed response: no embedding returned"))
                });
            Attempt::Done(parsed)
        })
        .await
    }

    /// Run one chat completion
    pub async fn chat(&self, request: &SynthesisRequest<'_>, temperature: f32) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let url = url.as_str();
        let user = request.user_message();
        let user = user.as_str();

        tracing::info!("Generating answer with model: {}", self.generate_model);

        retry_with_backoff(self.max_retries, || async move {
            let body = ChatRequest {
                model: &self.generate_model,
                temperature,
                max_tokens: request.max_tokens,
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
                    r.choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.message.content)
                        .ok_or_else(|| Error::synthesis("malformed response: no message content"))
                });
            Attempt::Done(parsed)
        })
        .await
    }

    /// Check the API is reachable with the configured key
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    pub fn generate_model(&self) -> &str {
        &self.generate_model
    }
}

/// OpenAI embedding provider
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(client: Arc<OpenAiClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
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
        "openai"
    }
}

/// OpenAI chat-completion provider
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    temperature: f32,
}

impl OpenAiLlm {
    pub fn new(client: Arc<OpenAiClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn complete(&self, request: &SynthesisRequest<'_>) -> Result<String> {
        self.client.chat(request, self.temperature).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        self.client.generate_model()
    }
}
