//! Chunk storage.
//!
//! Maps vector ids to the chunk text and provenance they were embedded from.
//! Stored in RocksDB next to the vector index so both survive restarts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use docqa_types::{Chunk, DocumentSummary};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VectorError;

/// Column family holding chunk entries
pub const CF_CHUNK_META: &str = "chunk_meta";

/// Stored chunk, keyed by its vector id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub vector_id: u64,
    pub file_name: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub text: String,
    /// When the chunk was indexed (ms since epoch)
    pub indexed_at: i64,
}

impl ChunkEntry {
    pub fn new(
        vector_id: u64,
        file_name: impl Into<String>,
        page_number: u32,
        chunk_index: u32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            vector_id,
            file_name: file_name.into(),
            page_number,
            chunk_index,
            text: text.into(),
            indexed_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            chunk_id: self.vector_id,
            file_name: self.file_name.clone(),
            page_number: self.page_number,
            chunk_index: self.chunk_index,
            text: self.text.clone(),
        }
    }
}

fn decode(bytes: &[u8]) -> Result<ChunkEntry, VectorError> {
    serde_json::from_slice(bytes).map_err(|e| VectorError::Serialization(e.to_string()))
}

fn encode(entry: &ChunkEntry) -> Result<Vec<u8>, VectorError> {
    serde_json::to_vec(entry).map_err(|e| VectorError::Serialization(e.to_string()))
}

/// Chunk storage using RocksDB.
pub struct ChunkStore {
    db: DB,
}

impl ChunkStore {
    /// Open or create chunk storage.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_CHUNK_META, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        info!(path = ?path, "Opened chunk storage");
        Ok(Self { db })
    }

    fn cf(&self) -> Result<&ColumnFamily, VectorError> {
        self.db
            .cf_handle(CF_CHUNK_META)
            .ok_or_else(|| VectorError::Index(format!("column family {CF_CHUNK_META} missing")))
    }

    pub fn put(&self, entry: &ChunkEntry) -> Result<(), VectorError> {
        self.db
            .put_cf(self.cf()?, entry.vector_id.to_be_bytes(), encode(entry)?)?;
        debug!(vector_id = entry.vector_id, file = %entry.file_name, "Stored chunk");
        Ok(())
    }

    /// Store many entries in one atomic write.
    pub fn put_batch(&self, entries: &[ChunkEntry]) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for entry in entries {
            batch.put_cf(cf, entry.vector_id.to_be_bytes(), encode(entry)?);
        }
        self.db.write(batch)?;
        debug!(count = entries.len(), "Stored chunk batch");
        Ok(())
    }

    pub fn get(&self, vector_id: u64) -> Result<Option<ChunkEntry>, VectorError> {
        match self.db.get_cf(self.cf()?, vector_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, vector_id: u64) -> Result<(), VectorError> {
        self.db.delete_cf(self.cf()?, vector_id.to_be_bytes())?;
        Ok(())
    }

    /// Delete every chunk of a file, returning the removed vector ids.
    pub fn delete_file(&self, file_name: &str) -> Result<Vec<u64>, VectorError> {
        let ids: Vec<u64> = self
            .get_all()?
            .into_iter()
            .filter(|e| e.file_name == file_name)
            .map(|e| e.vector_id)
            .collect();

        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for id in &ids {
            batch.delete_cf(cf, id.to_be_bytes());
        }
        self.db.write(batch)?;

        debug!(file = file_name, removed = ids.len(), "Deleted file chunks");
        Ok(ids)
    }

    pub fn count(&self) -> Result<usize, VectorError> {
        Ok(self.db.iterator_cf(self.cf()?, IteratorMode::Start).count())
    }

    /// All entries in vector id order. Use with caution on large stores.
    pub fn get_all(&self) -> Result<Vec<ChunkEntry>, VectorError> {
        let mut entries = Vec::new();
        for item in self.db.iterator_cf(self.cf()?, IteratorMode::Start) {
            let (_, value) = item?;
            entries.push(decode(&value)?);
        }
        Ok(entries)
    }

    /// Remove every entry. Used during full rebuilds.
    pub fn clear(&self) -> Result<(), VectorError> {
        let cf = self.cf()?;
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
        }
        self.db.write(batch)?;

        debug!("Cleared all chunk entries");
        Ok(())
    }

    /// One past the highest stored id, starting from 1.
    pub fn next_vector_id(&self) -> Result<u64, VectorError> {
        let mut iter = self.db.iterator_cf(self.cf()?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    VectorError::Serialization(format!("bad chunk key length {}", key.len()))
                })?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(1),
        }
    }

    /// Per-file page and chunk counts, sorted by file name.
    pub fn list_documents(&self) -> Result<Vec<DocumentSummary>, VectorError> {
        let mut files: BTreeMap<String, (BTreeSet<u32>, u64)> = BTreeMap::new();
        for entry in self.get_all()? {
            let slot = files.entry(entry.file_name).or_default();
            slot.0.insert(entry.page_number);
            slot.1 += 1;
        }
        Ok(files
            .into_iter()
            .map(|(file_name, (pages, chunks))| DocumentSummary {
                file_name,
                pages: pages.len() as u32,
                chunks,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: u64, file: &str, page: u32, idx: u32) -> ChunkEntry {
        ChunkEntry::new(id, file, page, idx, format!("chunk {id} of {file}"))
    }

    #[test]
    fn test_put_and_get() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();

        let e = entry(1, "policy.pdf", 3, 0);
        store.put(&e).unwrap();

        let got = store.get(1).unwrap().unwrap();
        assert_eq!(got, e);
        let chunk = got.to_chunk();
        assert_eq!(chunk.chunk_id, 1);
        assert_eq!(chunk.page_number, 3);
        assert!(store.get(2).unwrap().is_none());
    }

    #[test]
    fn test_next_vector_id() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        assert_eq!(store.next_vector_id().unwrap(), 1);

        store.put(&entry(5, "a.txt", 1, 0)).unwrap();
        store.put(&entry(300, "a.txt", 1, 1)).unwrap();
        assert_eq!(store.next_vector_id().unwrap(), 301);
    }

    #[test]
    fn test_delete_one() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        store.put(&entry(1, "a.txt", 1, 0)).unwrap();

        store.delete(1).unwrap();
        assert!(store.get(1).unwrap().is_none());
        // Deleting a missing id is not an error
        store.delete(42).unwrap();
    }

    #[test]
    fn test_delete_file() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        store
            .put_batch(&[
                entry(1, "a.txt", 1, 0),
                entry(2, "b.pdf", 1, 0),
                entry(3, "a.txt", 1, 1),
            ])
            .unwrap();

        let removed = store.delete_file("a.txt").unwrap();
        assert_eq!(removed, vec![1, 3]);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.delete_file("missing.txt").unwrap().is_empty());
    }

    #[test]
    fn test_list_documents() {
        let temp = TempDir::new().unwrap();
        let store = ChunkStore::open(temp.path()).unwrap();
        store
            .put_batch(&[
                entry(1, "b.pdf", 1, 0),
                entry(2, "b.pdf", 2, 0),
                entry(3, "b.pdf", 2, 1),
                entry(4, "a.txt", 1, 0),
            ])
            .unwrap();

        let docs = store.list_documents().unwrap();
        assert_eq!(
            docs,
            vec![
                DocumentSummary {
                    file_name: "a.txt".into(),
                    pages: 1,
                    chunks: 1
                },
                DocumentSummary {
                    file_name: "b.pdf".into(),
                    pages: 2,
                    chunks: 3
                },
            ]
        );
    }

    #[test]
    fn test_clear_and_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = ChunkStore::open(temp.path()).unwrap();
            store.put(&entry(1, "a.txt", 1, 0)).unwrap();
        }
        let store = ChunkStore::open(temp.path()).unwrap();
        assert_eq!(store.count().unwrap(), 1);

        store.clear().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.next_vector_id().unwrap(), 1);
    }
}
