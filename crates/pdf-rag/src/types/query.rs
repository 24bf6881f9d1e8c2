//! Retrieval results and API payloads

use serde::{Deserialize, Serialize};

/// A retrieved text with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredText {
    /// Record id
    pub id: String,
    /// Retrieved text
    pub text: String,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub score: f32,
}

/// Ranked nearest-neighbour results, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub matches: Vec<ScoredText>,
}

impl QueryResult {
    pub fn new(matches: Vec<ScoredText>) -> Self {
        Self { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Texts in rank order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.matches.iter().map(|m| m.text.as_str())
    }

    /// Best match, if any
    pub fn top(&self) -> Option<&ScoredText> {
        self.matches.first()
    }
}

/// POST /ask_question/ body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub user_question: String,
}

/// POST /ask_question/ response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub answer: String,
}

/// POST /upload_pdf/ response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub chunks_count: usize,
}
