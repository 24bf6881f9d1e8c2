//! Error types for the RAG system

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG system errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller supplied unusable input (empty text, bad chunking parameters, wrong file type)
    #[error("{0}")]
    Input(String),

    /// Embedding provider failure, including timeouts and malformed vectors
    #[error("embedding error: {0}")]
    Embedding(String),

    /// A record id already exists in the vector index
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    /// Vector length does not match the collection dimension
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector index storage failure
    #[error("Vector index storage error: {0}")]
    Storage(String),

    /// Answer synthesis (language model) failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// A whole operation ran past its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a synthesis error
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Short machine-readable kind, used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Input(_) => "input_error",
            Error::Embedding(_) => "embedding_error",
            Error::DuplicateId(_) => "duplicate_id",
            Error::DimensionMismatch { .. } => "dimension_mismatch",
            Error::Storage(_) => "index_error",
            Error::Synthesis(_) => "synthesis_error",
            Error::Timeout(_) => "timeout",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Input, configuration and id-collision problems need a change on the
    /// caller's side; provider and infrastructure failures do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_)
                | Error::Storage(_)
                | Error::Synthesis(_)
                | Error::Timeout(_)
                | Error::Io(_)
                | Error::Http(_)
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Input(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateId(_) => StatusCode::CONFLICT,
            Error::Embedding(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::Synthesis(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Config(_)
            | Error::DimensionMismatch { .. }
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_stage_wording() {
        assert_eq!(
            Error::input("empty or unchunkable text").to_string(),
            "empty or unchunkable text"
        );
        assert_eq!(
            Error::embedding("timed out").to_string(),
            "embedding error: timed out"
        );
    }

    #[test]
    fn test_retryable_split() {
        assert!(Error::embedding("quota").is_retryable());
        assert!(Error::synthesis("503").is_retryable());
        assert!(Error::storage("disk full").is_retryable());
        assert!(Error::Timeout("doc.pdf after 600s".into()).is_retryable());
        assert!(!Error::input("no text").is_retryable());
        assert!(!Error::DuplicateId("a:0".into()).is_retryable());
        assert!(!Error::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::input("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::DuplicateId("x".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::embedding("x").into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::synthesis("x").into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Timeout("x".into()).into_response().status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
