//! LLM provider trait for answer synthesis

use async_trait::async_trait;

use crate::error::Result;

/// One answer-synthesis call
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest<'a> {
    /// Fixed system instruction
    pub system: &'a str,
    /// Retrieved context block
    pub context: &'a str,
    /// User question
    pub question: &'a str,
    /// Response token budget
    pub max_tokens: usize,
}

impl SynthesisRequest<'_> {
    /// User message interpolating context and question
    pub fn user_message(&self) -> String {
        format!(
            "Context: {}\n\nQuestion: {}\n\nAnswer:",
            self.context, self.question
        )
    }
}

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `OpenAiLlm`: OpenAI chat completions (gpt-3.5-turbo)
/// - `OllamaLlm`: Local Ollama server (phi3, llama3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the answer text for a request
    async fn complete(&self, request: &SynthesisRequest<'_>) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
