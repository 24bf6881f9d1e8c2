//! pdf-rag: question answering over uploaded PDFs
//!
//! PDFs are split into overlapping word windows, embedded, and stored in a
//! durable SQLite vector index. Questions are embedded, matched against the
//! index by cosine similarity, and answered by a language model from the
//! top matches.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::{QueryOutcome, QueryPipeline};
pub use ingestion::{IngestPipeline, IngestReport, WordChunker};
pub use retrieval::{MemoryVectorIndex, SqliteVectorIndex, VectorIndex};
pub use service::RagService;
pub use types::{Chunk, IndexRecord, QueryResult};
