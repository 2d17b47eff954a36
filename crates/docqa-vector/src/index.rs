//! Vector index trait and types.

use docqa_embeddings::Embedding;
use docqa_types::DistanceMetric;

use crate::error::VectorError;

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub vector_id: u64,
    /// Squared distance for L2 (lower is closer), similarity for cosine
    /// (higher is closer)
    pub score: f32,
}

impl SearchResult {
    pub fn new(vector_id: u64, score: f32) -> Self {
        Self { vector_id, score }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub vector_count: usize,
    pub dimension: usize,
    /// Size of the persisted index file, 0 before the first save
    pub size_bytes: u64,
    pub available: bool,
}

/// Nearest-neighbour index over fixed-dimension embeddings.
///
/// The dimension is fixed at creation: adding or searching with any other
/// dimension fails with `DimensionMismatch`. Callers wrap the index in a
/// lock; `&self` methods are safe to run concurrently.
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a vector; fails with `DuplicateId` if `id` is already present.
    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError>;

    fn add_batch(&mut self, vectors: &[(u64, Embedding)]) -> Result<(), VectorError> {
        for (id, emb) in vectors {
            self.add(*id, emb)?;
        }
        Ok(())
    }

    /// Up to `k` nearest vectors, best first. Empty when `k == 0` or the
    /// index is empty.
    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError>;

    /// Remove a vector; returns whether it was present.
    fn remove(&mut self, id: u64) -> Result<bool, VectorError>;

    fn contains(&self, id: u64) -> bool;

    fn stats(&self) -> IndexStats;

    /// Persist to the index directory.
    fn save(&self) -> Result<(), VectorError>;

    fn clear(&mut self) -> Result<(), VectorError>;
}

pub(crate) fn check_dimension(expected: usize, embedding: &Embedding) -> Result<(), VectorError> {
    if embedding.dimension() != expected {
        return Err(VectorError::DimensionMismatch {
            expected,
            actual: embedding.dimension(),
        });
    }
    Ok(())
}
