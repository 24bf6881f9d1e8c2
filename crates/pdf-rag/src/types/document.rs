//! Chunk and index record types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// String metadata attached to an index record
pub type Metadata = BTreeMap<String, String>;

/// Metadata key naming the source document
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding the chunk ordinal
pub const CHUNK_ID_KEY: &str = "chunk_id";

/// A contiguous word window of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Record id, `{document_id}:{ordinal}`
    pub id: String,
    /// Chunk text, words joined by single spaces
    pub text: String,
    /// Identifier of the document the chunk came from
    pub source_document: String,
    /// 0-based position in the document's chunk sequence
    pub ordinal: usize,
}

impl Chunk {
    /// Create a chunk, deriving its id from the document and ordinal
    pub fn new(source_document: &str, ordinal: usize, text: String) -> Self {
        Self {
            id: Self::record_id(source_document, ordinal),
            text,
            source_document: source_document.to_string(),
            ordinal,
        }
    }

    /// Document-namespaced record id
    pub fn record_id(document_id: &str, ordinal: usize) -> String {
        format!("{}:{}", document_id, ordinal)
    }

    /// Metadata stored alongside the chunk's vector
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), self.source_document.clone());
        metadata.insert(CHUNK_ID_KEY.to_string(), self.ordinal.to_string());
        metadata
    }

    /// Pair the chunk with its embedding as an index record
    pub fn into_record(self, vector: Vec<f32>) -> IndexRecord {
        let metadata = self.metadata();
        IndexRecord {
            id: self.id,
            vector,
            text: self.text,
            metadata,
        }
    }
}

/// A stored (id, vector, text, metadata) tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique record id
    pub id: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Text returned on retrieval
    pub text: String,
    /// String metadata
    pub metadata: Metadata,
}

impl IndexRecord {
    /// Source document recorded in the metadata, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_namespaced() {
        let a = Chunk::new("report.pdf", 0, "alpha".to_string());
        let b = Chunk::new("notes.pdf", 0, "alpha".to_string());
        assert_eq!(a.id, "report.pdf:0");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_into_record_metadata() {
        let record = Chunk::new("report.pdf", 7, "text".to_string()).into_record(vec![1.0, 0.0]);
        assert_eq!(record.id, "report.pdf:7");
        assert_eq!(record.source(), Some("report.pdf"));
        assert_eq!(record.metadata.get(CHUNK_ID_KEY).map(String::as_str), Some("7"));
        assert_eq!(record.text, "text");
    }
}
