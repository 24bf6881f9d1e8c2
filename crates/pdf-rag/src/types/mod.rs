//! Core types for the RAG system

pub mod document;
pub mod query;

pub use document::{Chunk, IndexRecord, Metadata};
pub use query::{
    QueryResult, QuestionRequest, QuestionResponse, ScoredText, UploadResponse,
};
