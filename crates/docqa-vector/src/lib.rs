//! # docqa-vector
//!
//! Vector indexes and chunk storage for document QA.
//!
//! - [`FlatIndex`]: exact search, squared L2 or cosine, persisted as JSON
//! - [`HnswIndex`]: approximate search via usearch
//! - [`ChunkStore`]: RocksDB map from vector id to chunk text and provenance

pub mod error;
pub mod flat;
pub mod hnsw;
pub mod index;
pub mod open;
pub mod store;

pub use error::VectorError;
pub use flat::{FlatConfig, FlatIndex, FLAT_INDEX_FILE};
pub use hnsw::{HnswConfig, HnswIndex, HNSW_INDEX_FILE};
pub use index::{IndexStats, SearchResult, VectorIndex};
pub use open::{index_exists, open_index};
pub use store::{ChunkEntry, ChunkStore, CF_CHUNK_META};
