//! # docqa-search
//!
//! BM25 keyword search over document chunks, backed by Tantivy.
//!
//! Each chunk becomes one Tantivy document keyed by its vector id, so keyword
//! hits and vector hits can be fused by id.

pub mod error;
pub mod index;
pub mod indexer;
pub mod schema;
pub mod searcher;

pub use error::SearchError;
pub use index::{index_exists, SearchIndex, SearchIndexConfig};
pub use indexer::ChunkIndexer;
pub use schema::{build_chunk_schema, ChunkSchema};
pub use searcher::{ChunkSearcher, KeywordHit};
