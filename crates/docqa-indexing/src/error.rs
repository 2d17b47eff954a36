//! Error types for the indexing pipeline.

use docqa_embeddings::EmbeddingError;
use docqa_extract::ExtractError;
use docqa_search::SearchError;
use docqa_vector::VectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexingError {
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    /// BM25 search index error
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Generic index operation error
    #[error("Index error: {0}")]
    Index(String),

    /// A writer panicked while holding the index lock
    #[error("Index lock poisoned")]
    LockPoisoned,
}
