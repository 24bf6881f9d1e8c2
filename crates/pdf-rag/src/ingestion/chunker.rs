//! Deterministic word-window chunking

use crate::error::{Error, Result};

/// Sliding-window chunker over whitespace-delimited words
///
/// Windows hold `chunk_size` words and start every `chunk_size - overlap`
/// words; the last window may be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordChunker {
    chunk_size: usize,
    overlap: usize,
}

impl WordChunker {
    /// Create a chunker; `overlap` must be smaller than a non-zero `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::input("chunk size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(Error::input(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Words the window start advances by
    fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split text into chunk strings
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let stride = self.stride();

        (0..words.len())
            .step_by(stride)
            .map(|start| {
                let end = (start + self.chunk_size).min(words.len());
                words[start..end].join(" ")
            })
            .collect()
    }

    /// Number of chunks `chunk` yields for `word_count` words
    pub fn expected_chunks(&self, word_count: usize) -> usize {
        word_count.div_ceil(self.stride())
    }
}

impl Default for WordChunker {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}
