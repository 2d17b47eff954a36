//! On-disk Tantivy index for chunk text.

use std::path::{Path, PathBuf};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::schema::{build_chunk_schema, ChunkSchema};

/// Heap handed to the index writer. Chunk batches are small, so Tantivy's
/// lower bound is plenty.
const WRITER_HEAP_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    pub index_path: PathBuf,
    pub writer_heap_bytes: usize,
}

impl SearchIndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_heap_bytes: WRITER_HEAP_BYTES,
        }
    }
}

/// A chunk index opened from (or created in) one directory.
pub struct SearchIndex {
    index: Index,
    schema: ChunkSchema,
    config: SearchIndexConfig,
}

impl SearchIndex {
    /// Open the index in `config.index_path`, creating the directory and an
    /// empty index on first use. An existing index with other fields fails
    /// with `SchemaMismatch`.
    pub fn open_or_create(config: SearchIndexConfig) -> Result<Self, SearchError> {
        let path = &config.index_path;
        let index = if index_exists(path) {
            debug!(path = ?path, "Opening chunk index");
            Index::open_in_dir(path)?
        } else {
            info!(path = ?path, "Creating chunk index");
            std::fs::create_dir_all(path)?;
            Index::create_in_dir(path, build_chunk_schema().schema().clone())?
        };
        let schema = ChunkSchema::from_schema(index.schema())?;
        Ok(Self {
            index,
            schema,
            config,
        })
    }

    pub fn schema(&self) -> &ChunkSchema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Tantivy allows one writer per index; `ChunkIndexer` holds it.
    pub fn writer(&self) -> Result<IndexWriter, SearchError> {
        Ok(self.index.writer(self.config.writer_heap_bytes)?)
    }

    /// Readers are reloaded explicitly after each commit.
    pub fn reader(&self) -> Result<IndexReader, SearchError> {
        Ok(self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?)
    }
}

/// Whether a chunk index has been created under `path`.
pub fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_then_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bm25");
        assert!(!index_exists(&path));

        SearchIndex::open_or_create(SearchIndexConfig::new(&path)).unwrap();
        assert!(index_exists(&path));

        let reopened = SearchIndex::open_or_create(SearchIndexConfig::new(&path)).unwrap();
        let _writer = reopened.writer().unwrap();
        let _reader = reopened.reader().unwrap();
    }

    #[test]
    fn test_foreign_schema_rejected() {
        let temp = TempDir::new().unwrap();
        let mut builder = tantivy::schema::Schema::builder();
        builder.add_text_field("body", tantivy::schema::TEXT);
        Index::create_in_dir(temp.path(), builder.build()).unwrap();

        assert!(matches!(
            SearchIndex::open_or_create(SearchIndexConfig::new(temp.path())),
            Err(SearchError::SchemaMismatch(_))
        ));
    }
}
