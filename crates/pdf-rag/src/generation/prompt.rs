//! Prompt template for grounded answers

use crate::providers::SynthesisRequest;
use crate::types::QueryResult;

/// Answer returned when retrieval finds nothing
pub const FALLBACK_ANSWER: &str =
    "I don't have enough context to answer this question. Please upload a relevant PDF first.";

/// System role for every synthesis call
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant that answers questions using only the provided context.";

/// Prompt builder for RAG queries
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    max_tokens: usize,
}

impl PromptBuilder {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Retrieved texts in ranked order, one per line
    pub fn build_context(result: &QueryResult) -> String {
        result.texts().collect::<Vec<_>>().join("\n")
    }

    /// Synthesis request over an assembled context
    pub fn request<'a>(&self, context: &'a str, question: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            system: SYSTEM_INSTRUCTION,
            context,
            question,
            max_tokens: self.max_tokens,
        }
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoredText;

    #[test]
    fn test_context_keeps_rank_order() {
        let result = QueryResult::new(vec![
            ScoredText {
                id: "a:1".into(),
                text: "best".into(),
                score: 0.9,
            },
            ScoredText {
                id: "b:0".into(),
                text: "second".into(),
                score: 0.4,
            },
        ]);
        assert_eq!(PromptBuilder::build_context(&result), "best\nsecond");
    }

    #[test]
    fn test_request_uses_fixed_instruction() {
        let builder = PromptBuilder::default();
        let request = builder.request("ctx", "what?");
        assert_eq!(request.system, SYSTEM_INSTRUCTION);
        assert_eq!(request.max_tokens, 500);
        assert_eq!(
            request.user_message(),
            "Context: ctx\n\nQuestion: what?\n\nAnswer:"
        );
    }
}
