//! # docqa-indexing
//!
//! Turns extracted page chunks into searchable state: embeddings in the
//! vector index, chunk text in the chunk store, and terms in the BM25
//! index. [`DocumentIndex`] keeps the three in step and answers both
//! vector and keyword lookups.

pub mod document_index;
pub mod error;
pub mod progress;

pub use document_index::{BuildStats, DocumentIndex, IndexSummary, IndexingConfig, ScoredChunk};
pub use error::IndexingError;
pub use progress::{BuildProgress, LoggingProgressCallback, NoOpProgressCallback, ProgressCallback};
