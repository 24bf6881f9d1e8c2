//! Vector index for chunk storage and nearest-neighbour search
//!
//! Similarity is cosine similarity over the raw vectors, so providers do not
//! need to normalise their output. Ties keep insertion order.

mod memory;
mod sqlite;

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::{IndexRecord, QueryResult, ScoredText};

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `SqliteVectorIndex`: durable named collection in a SQLite file
/// - `MemoryVectorIndex`: in-process, lost on exit
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Add records. A batch with any id already stored, or repeated within
    /// the batch, is rejected whole with `Error::DuplicateId`.
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<()>;

    /// Top `k` records by cosine similarity, best first
    async fn query(&self, vector: &[f32], k: usize) -> Result<QueryResult>;

    /// Number of stored records
    async fn len(&self) -> Result<usize>;

    /// Check if the index is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Whether a record id is stored
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Delete every record, returning how many were removed
    async fn reset(&self) -> Result<usize>;

    /// Vector dimension accepted by this index
    fn dimensions(&self) -> usize;

    /// Get index name for logging
    fn name(&self) -> &str;
}

/// Cosine similarity; 0.0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Bounded best-first collector. Candidates must be offered in insertion
/// order; an equal score never displaces an earlier candidate.
pub(crate) struct TopK {
    k: usize,
    matches: Vec<ScoredText>,
}

impl TopK {
    pub(crate) fn new(k: usize) -> Self {
        Self {
            k,
            matches: Vec::with_capacity(k.min(64)),
        }
    }

    /// Whether a candidate with this score would enter the result
    pub(crate) fn accepts(&self, score: f32) -> bool {
        let score = Self::sanitize(score);
        match self.matches.last() {
            _ if self.k == 0 => false,
            Some(worst) if self.matches.len() == self.k => score > worst.score,
            _ => true,
        }
    }

    pub(crate) fn offer(&mut self, score: f32, id: String, text: String) {
        if !self.accepts(score) {
            return;
        }
        let score = Self::sanitize(score);
        let pos = self.matches.partition_point(|m| m.score >= score);
        self.matches.insert(pos, ScoredText { id, text, score });
        self.matches.truncate(self.k);
    }

    pub(crate) fn into_result(self) -> QueryResult {
        QueryResult::new(self.matches)
    }

    fn sanitize(score: f32) -> f32 {
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }
}

/// Reject non-positive `k`
pub(crate) fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::input("k must be positive"));
    }
    Ok(())
}

/// Reject a query vector of the wrong length
pub(crate) fn check_query_dimensions(vector: &[f32], dimensions: usize) -> Result<()> {
    if vector.len() != dimensions {
        return Err(Error::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Check dimensions and in-batch/stored id collisions before any write
pub(crate) fn validate_batch<F>(
    records: &[IndexRecord],
    dimensions: usize,
    mut exists: F,
) -> Result<()>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if record.vector.len() != dimensions {
            return Err(Error::DimensionMismatch {
                expected: dimensions,
                actual: record.vector.len(),
            });
        }
        if !seen.insert(record.id.as_str()) || exists(&record.id)? {
            return Err(Error::DuplicateId(record.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_top_k_orders_and_truncates() {
        let mut top = TopK::new(2);
        top.offer(0.1, "a".into(), "A".into());
        top.offer(0.9, "b".into(), "B".into());
        top.offer(0.5, "c".into(), "C".into());
        let result = top.into_result();
        let ids: Vec<_> = result.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_top_k_ties_keep_insertion_order() {
        let mut top = TopK::new(2);
        top.offer(0.5, "first".into(), "1".into());
        top.offer(0.5, "second".into(), "2".into());
        top.offer(0.5, "third".into(), "3".into());
        let result = top.into_result();
        let ids: Vec<_> = result.matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn test_top_k_nan_ranks_last() {
        let mut top = TopK::new(3);
        top.offer(f32::NAN, "nan".into(), "".into());
        top.offer(-0.5, "neg".into(), "".into());
        let result = top.into_result();
        assert_eq!(result.matches[0].id, "neg");
        assert_eq!(result.matches[1].id, "nan");
    }

    #[test]
    fn test_validate_batch() {
        let record = |id: &str, dims: usize| IndexRecord {
            id: id.to_string(),
            vector: vec![1.0; dims],
            text: String::new(),
            metadata: Default::default(),
        };
        let none = |_: &str| Ok(false);

        assert!(validate_batch(&[record("a", 2), record("b", 2)], 2, none).is_ok());
        assert!(matches!(
            validate_batch(&[record("a", 2), record("a", 2)], 2, none),
            Err(Error::DuplicateId(id)) if id == "a"
        ));
        assert!(matches!(
            validate_batch(&[record("a", 3)], 2, none),
            Err(Error::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(
            validate_batch(&[record("a", 2)], 2, |id: &str| Ok(id == "a")),
            Err(Error::DuplicateId(_))
        ));
    }
}
