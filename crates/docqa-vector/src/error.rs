//! Vector index error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    /// Index backend error
    #[error("Index error: {0}")]
    Index(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted index was built with another distance metric
    #[error("Metric mismatch: expected {expected:?}, index was built with {actual:?}")]
    MetricMismatch {
        expected: docqa_types::DistanceMetric,
        actual: docqa_types::DistanceMetric,
    },

    /// A vector with this id is already stored
    #[error("Duplicate vector id: {0}")]
    DuplicateId(u64),

    #[error("Vector not found: {0}")]
    NotFound(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// A lock was poisoned by a panicking writer
    #[error("Index lock poisoned")]
    LockPoisoned,

    #[error("Embedding error: {0}")]
    Embedding(#[from] docqa_embeddings::EmbeddingError),
}
