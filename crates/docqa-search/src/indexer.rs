//! Adds chunks to the Tantivy index.
//!
//! Documents are not visible to searchers until `commit()`.

use std::sync::{Mutex, MutexGuard};

use docqa_types::Chunk;
use tantivy::{doc, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info, warn};

use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::ChunkSchema;

pub struct ChunkIndexer {
    writer: Mutex<IndexWriter>,
    schema: ChunkSchema,
}

fn chunk_to_doc(schema: &ChunkSchema, chunk: &Chunk) -> TantivyDocument {
    doc!(
        schema.chunk_id => chunk.chunk_id.to_string(),
        schema.file_name => chunk.file_name.clone(),
        schema.page_number => chunk.page_number.to_string(),
        schema.text => chunk.text.clone(),
    )
}

impl ChunkIndexer {
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        Ok(Self {
            writer: Mutex::new(index.writer()?),
            schema: index.schema().clone(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexWriter>, SearchError> {
        self.writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))
    }

    /// Index one chunk, replacing any chunk with the same id.
    pub fn index_chunk(&self, chunk: &Chunk) -> Result<(), SearchError> {
        let writer = self.lock()?;
        writer.delete_term(Term::from_field_text(
            self.schema.chunk_id,
            &chunk.chunk_id.to_string(),
        ));
        writer.add_document(chunk_to_doc(&self.schema, chunk))?;

        debug!(chunk_id = chunk.chunk_id, file = %chunk.file_name, "Indexed chunk");
        Ok(())
    }

    pub fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize, SearchError> {
        let writer = self.lock()?;
        for chunk in chunks {
            writer.delete_term(Term::from_field_text(
                self.schema.chunk_id,
                &chunk.chunk_id.to_string(),
            ));
            writer.add_document(chunk_to_doc(&self.schema, chunk))?;
        }

        debug!(count = chunks.len(), "Indexed chunk batch");
        Ok(chunks.len())
    }

    /// Delete every chunk of a file.
    pub fn delete_file(&self, file_name: &str) -> Result<(), SearchError> {
        let writer = self.lock()?;
        writer.delete_term(Term::from_field_text(self.schema.file_name, file_name));
        debug!(file = file_name, "Deleted file chunks");
        Ok(())
    }

    /// Remove every document. Takes effect on the next commit.
    pub fn clear(&self) -> Result<(), SearchError> {
        let writer = self.lock()?;
        writer.delete_all_documents()?;
        info!("Cleared search index");
        Ok(())
    }

    /// Commit pending changes to make them searchable.
    pub fn commit(&self) -> Result<u64, SearchError> {
        let mut writer = self.lock()?;
        let opstamp = writer.commit()?;
        info!(opstamp, "Committed index changes");
        Ok(opstamp)
    }

    pub fn rollback(&self) -> Result<u64, SearchError> {
        let mut writer = self.lock()?;
        let opstamp = writer.rollback()?;
        warn!(opstamp, "Rolled back index changes");
        Ok(opstamp)
    }
}
