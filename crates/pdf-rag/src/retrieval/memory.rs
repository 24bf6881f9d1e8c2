//! In-memory vector index
//!
//! Same contract as the SQLite index, without durability. Useful for tests
//! and throwaway sessions.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;

use crate::error::Result;
use crate::types::{IndexRecord, QueryResult};

use super::{
    check_k, check_query_dimensions, cosine_similarity, validate_batch, TopK, VectorIndex,
};

#[derive(Default)]
struct Inner {
    /// Records in insertion order
    records: Vec<IndexRecord>,
    ids: HashSet<String>,
}

/// Brute-force in-memory index
pub struct MemoryVectorIndex {
    dimensions: usize,
    inner: RwLock<Inner>,
}

impl MemoryVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Stored records whose `source` metadata matches
    pub fn records_for_source(&self, source: &str) -> Vec<IndexRecord> {
        self.inner
            .read()
            .records
            .iter()
            .filter(|r| r.source() == Some(source))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()> {
        let mut inner = self.inner.write();
        validate_batch(&records, self.dimensions, |id| Ok(inner.ids.contains(id)))?;
        for record in records {
            inner.ids.insert(record.id.clone());
            inner.records.push(record);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult> {
        check_k(k)?;
        check_query_dimensions(vector, self.dimensions)?;
        let inner = self.inner.read();
        let mut top = TopK::new(k);
        for record in &inner.records {
            let score = cosine_similarity(vector, &record.vector);
            if top.accepts(score) {
                top.offer(score, record.id.clone(), record.text.clone());
            }
        }
        Ok(top.into_result())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.inner.read().ids.contains(id))
    }

    async fn reset(&self) -> Result<usize> {
        let mut inner = self.inner.write();
        let removed = inner.records.len();
        *inner = Inner::default();
        Ok(removed)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::Chunk;

    fn record(doc: &str, ordinal: usize, vector: Vec<f32>) -> IndexRecord {
        Chunk::new(doc, ordinal, format!("{} chunk {}", doc, ordinal)).into_record(vector)
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let index = MemoryVectorIndex::new(2);
        let result = index.query(&[1.0, 0.0], 3).await.unwrap();
        assert!(result.is_empty());
        assert!(index.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_query_ranks_and_caps() {
        let index = MemoryVectorIndex::new(2);
        index
            .upsert(vec![
                record("a", 0, vec![0.0, 1.0]),
                record("a", 1, vec![1.0, 0.0]),
                record("a", 2, vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let result = index.query(&[1.0, 0.1], 5).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.matches[0].id, "a:1");
        assert!(result.matches.windows(2).all(|w| w[0].score >= w[1].score));

        let result = index.query(&[1.0, 0.1], 1).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_batch_rejected_whole() {
        let index = MemoryVectorIndex::new(2);
        index.upsert(vec![record("a", 0, vec![1.0, 0.0])]).await.unwrap();

        let err = index
            .upsert(vec![record("a", 1, vec![1.0, 0.0]), record("a", 0, vec![0.0, 1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "a:0"));
        assert_eq!(index.len().await.unwrap(), 1);
        assert!(!index.contains("a:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_k_rejected() {
        let index = MemoryVectorIndex::new(2);
        assert!(matches!(index.query(&[1.0, 0.0], 0).await, Err(Error::Input(_))));
    }

    #[tokio::test]
    async fn test_query_of_wrong_length_rejected() {
        let index = MemoryVectorIndex::new(2);
        index.upsert(vec![record("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], 1).await,
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_reset() {
        let index = MemoryVectorIndex::new(2);
        index.upsert(vec![record("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(index.reset().await.unwrap(), 1);
        assert!(index.is_empty().await.unwrap());
        index.upsert(vec![record("a", 0, vec![1.0, 0.0])]).await.unwrap();
        assert_eq!(index.records_for_source("a").len(), 1);
    }
}
