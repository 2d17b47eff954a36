//! The three stores behind retrieval, kept in step.
//!
//! A chunk lives in three places: its embedding in the vector index, its
//! text and provenance in the chunk store, and its terms in the BM25 index.
//! All three are keyed by the same vector id.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use docqa_embeddings::{check_dimensions, Embedding, EmbeddingModel};
use docqa_extract::PageChunk;
use docqa_search::{ChunkIndexer, ChunkSearcher, SearchIndex, SearchIndexConfig};
use docqa_types::{Chunk, DistanceMetric, DocumentSummary, IndexKind, Settings};
use docqa_vector::{index_exists, open_index, ChunkEntry, ChunkStore, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::IndexingError;
use crate::progress::{BuildProgress, ProgressCallback};

#[derive(Debug, Clone)]
pub struct IndexingConfig {
    pub kind: IndexKind,
    pub metric: DistanceMetric,
    /// Texts per embedding call
    pub batch_size: usize,
    pub vector_path: PathBuf,
    pub chunk_path: PathBuf,
    pub search_path: PathBuf,
}

impl IndexingConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            kind: settings.index.kind,
            metric: settings.index.metric,
            batch_size: settings.embedding.batch_size,
            vector_path: settings.vector_index_path(),
            chunk_path: settings.chunk_store_path(),
            search_path: settings.search_index_path(),
        }
    }

    /// All stores under one data directory, default index options.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            kind: IndexKind::default(),
            metric: DistanceMetric::default(),
            batch_size: 100,
            vector_path: data_dir.join("vectors"),
            chunk_path: data_dir.join("chunks"),
            search_path: data_dir.join("bm25"),
        }
    }
}

/// A chunk with the score that retrieved it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Counts from one build or append.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub files: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub kind: IndexKind,
    pub metric: DistanceMetric,
    pub dimension: usize,
    pub vectors: usize,
    pub chunks: usize,
    pub documents: usize,
    pub keyword_docs: u64,
    pub size_bytes: u64,
}

pub struct DocumentIndex {
    /// Held for reading during every lookup and for writing during every
    /// change, so the chunk store and BM25 index change together with it.
    vector: RwLock<Box<dyn VectorIndex>>,
    chunks: ChunkStore,
    keyword_indexer: ChunkIndexer,
    keyword_searcher: ChunkSearcher,
    embedder: Arc<dyn EmbeddingModel>,
    config: IndexingConfig,
}

fn distinct_files(chunks: &[PageChunk]) -> usize {
    chunks
        .iter()
        .map(|c| c.file_name.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

impl DocumentIndex {
    /// Open (or create empty) all three stores.
    ///
    /// Fails with a vector `DimensionMismatch` or `MetricMismatch` when a
    /// persisted flat index was built with a different embedding dimension
    /// or distance metric; rebuild from scratch after changing either.
    pub fn open(
        config: IndexingConfig,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Result<Self, IndexingError> {
        if config.batch_size == 0 {
            return Err(IndexingError::Index("batch_size must be > 0".into()));
        }
        let vector = open_index(
            config.kind,
            config.metric,
            embedder.dimension(),
            &config.vector_path,
        )?;
        let chunks = ChunkStore::open(&config.chunk_path)?;
        let search_index = SearchIndex::open_or_create(SearchIndexConfig::new(&config.search_path))?;
        let keyword_indexer = ChunkIndexer::new(&search_index)?;
        let keyword_searcher = ChunkSearcher::new(&search_index)?;

        info!(
            kind = ?config.kind,
            metric = ?config.metric,
            dim = embedder.dimension(),
            vectors = vector.len(),
            "Opened document index"
        );
        Ok(Self {
            vector: RwLock::new(vector),
            chunks,
            keyword_indexer,
            keyword_searcher,
            embedder,
            config,
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Box<dyn VectorIndex>>, IndexingError> {
        self.vector.read().map_err(|_| IndexingError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Box<dyn VectorIndex>>, IndexingError> {
        self.vector.write().map_err(|_| IndexingError::LockPoisoned)
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingModel> {
        &self.embedder
    }

    pub fn config(&self) -> &IndexingConfig {
        &self.config
    }

    /// Whether the stores must be rebuilt before serving: the vector index
    /// was never saved, or the three stores disagree on the chunk count.
    pub fn needs_rebuild(&self) -> Result<bool, IndexingError> {
        if !index_exists(&self.config.vector_path, self.config.kind) {
            info!(path = ?self.config.vector_path, "Vector index missing on disk");
            return Ok(true);
        }
        let vector = self.read()?;
        let vectors = vector.len();
        let chunks = self.chunks.count()?;
        let keyword_docs = self.keyword_searcher.num_docs() as usize;
        if vectors != chunks || keyword_docs != chunks {
            warn!(vectors, chunks, keyword_docs, "Index stores out of step");
            return Ok(true);
        }
        Ok(false)
    }

    /// Embed chunk texts in batches, checking every vector's dimension.
    fn embed_chunks(
        &self,
        chunks: &[PageChunk],
        progress_callback: &dyn ProgressCallback,
    ) -> Result<Vec<Embedding>, IndexingError> {
        let mut progress = BuildProgress::new(chunks.len());
        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            if embeddings.len() != texts.len() {
                return Err(IndexingError::Index(format!(
                    "embedder returned {} vectors for {} texts",
                    embeddings.len(),
                    texts.len()
                )));
            }
            check_dimensions(&embeddings, self.embedder.dimension())?;
            out.extend(embeddings);
            progress.record_batch(batch.len());
            progress_callback.on_progress(&progress);
        }
        Ok(out)
    }

    /// Write embedded chunks starting at `first_id`. Caller holds the
    /// write lock.
    fn insert(
        &self,
        vector: &mut Box<dyn VectorIndex>,
        first_id: u64,
        chunks: &[PageChunk],
        embeddings: Vec<Embedding>,
    ) -> Result<(), IndexingError> {
        let entries: Vec<ChunkEntry> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                ChunkEntry::new(
                    first_id + i as u64,
                    c.file_name.clone(),
                    c.page_number,
                    c.chunk_index,
                    c.text.clone(),
                )
            })
            .collect();
        let batch: Vec<(u64, Embedding)> = entries
            .iter()
            .map(|e| e.vector_id)
            .zip(embeddings)
            .collect();

        vector.add_batch(&batch)?;
        vector.save()?;
        self.chunks.put_batch(&entries)?;
        let docs: Vec<Chunk> = entries.iter().map(ChunkEntry::to_chunk).collect();
        if let Err(e) = self.keyword_indexer.index_chunks(&docs) {
            self.keyword_indexer.rollback()?;
            return Err(e.into());
        }
        self.keyword_indexer.commit()?;
        self.keyword_searcher.reload()?;
        Ok(())
    }

    /// Replace everything with `chunks`. Ids are assigned 1..=n in order.
    ///
    /// Embedding runs before the write lock is taken, so lookups keep
    /// answering from the old contents until the swap.
    pub fn rebuild(
        &self,
        chunks: &[PageChunk],
        progress_callback: &dyn ProgressCallback,
    ) -> Result<BuildStats, IndexingError> {
        info!(chunks = chunks.len(), "Rebuilding document index");
        let embeddings = self.embed_chunks(chunks, progress_callback)?;

        let mut vector = self.write()?;
        vector.clear()?;
        self.chunks.clear()?;
        self.keyword_indexer.clear()?;
        self.insert(&mut vector, 1, chunks, embeddings)?;

        let stats = BuildStats {
            files: distinct_files(chunks),
            chunks: chunks.len(),
        };
        info!(files = stats.files, chunks = stats.chunks, "Rebuild complete");
        Ok(stats)
    }

    /// Append chunks after the highest existing id.
    pub fn add(
        &self,
        chunks: &[PageChunk],
        progress_callback: &dyn ProgressCallback,
    ) -> Result<BuildStats, IndexingError> {
        let embeddings = self.embed_chunks(chunks, progress_callback)?;

        let mut vector = self.write()?;
        let first_id = self.chunks.next_vector_id()?;
        self.insert(&mut vector, first_id, chunks, embeddings)?;

        debug!(first_id, count = chunks.len(), "Appended chunks");
        Ok(BuildStats {
            files: distinct_files(chunks),
            chunks: chunks.len(),
        })
    }

    /// Replace the chunks of one file: its old chunks are removed and the
    /// new ones appended, under a single write lock.
    pub fn replace_file(
        &self,
        file_name: &str,
        chunks: &[PageChunk],
        progress_callback: &dyn ProgressCallback,
    ) -> Result<BuildStats, IndexingError> {
        let embeddings = self.embed_chunks(chunks, progress_callback)?;

        let mut vector = self.write()?;
        let removed = self.remove_locked(&mut vector, file_name)?;
        let first_id = self.chunks.next_vector_id()?;
        self.insert(&mut vector, first_id, chunks, embeddings)?;

        info!(
            file = file_name,
            removed,
            added = chunks.len(),
            "Replaced file chunks"
        );
        Ok(BuildStats {
            files: 1,
            chunks: chunks.len(),
        })
    }

    fn remove_locked(
        &self,
        vector: &mut Box<dyn VectorIndex>,
        file_name: &str,
    ) -> Result<usize, IndexingError> {
        let ids = self.chunks.delete_file(file_name)?;
        for id in &ids {
            vector.remove(*id)?;
        }
        if !ids.is_empty() {
            vector.save()?;
            self.keyword_indexer.delete_file(file_name)?;
            self.keyword_indexer.commit()?;
            self.keyword_searcher.reload()?;
        }
        Ok(ids.len())
    }

    /// Remove every chunk of a file; returns how many were removed.
    pub fn remove_file(&self, file_name: &str) -> Result<usize, IndexingError> {
        let mut vector = self.write()?;
        self.remove_locked(&mut vector, file_name)
    }

    /// Nearest chunks to a free-text query.
    pub fn search_vector(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, IndexingError> {
        let embedding = self.embedder.embed_query(query)?;
        self.search_embedding(&embedding, k)
    }

    pub fn search_embedding(
        &self,
        embedding: &Embedding,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, IndexingError> {
        let vector = self.read()?;
        let hits = vector.search(embedding, k)?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.chunks.get(hit.vector_id)? {
                Some(entry) => out.push(ScoredChunk {
                    chunk: entry.to_chunk(),
                    score: hit.score,
                }),
                None => warn!(vector_id = hit.vector_id, "Vector has no stored chunk"),
            }
        }
        Ok(out)
    }

    /// Best BM25 matches for a free-text query.
    pub fn search_keyword(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, IndexingError> {
        let _guard = self.read()?;
        let hits = self.keyword_searcher.search(query, k)?;

        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(entry) = self.chunks.get(hit.chunk_id)? {
                out.push(ScoredChunk {
                    chunk: entry.to_chunk(),
                    score: hit.score,
                });
            }
        }
        Ok(out)
    }

    pub fn documents(&self) -> Result<Vec<DocumentSummary>, IndexingError> {
        let _guard = self.read()?;
        Ok(self.chunks.list_documents()?)
    }

    pub fn summary(&self) -> Result<IndexSummary, IndexingError> {
        let vector = self.read()?;
        let stats = vector.stats();
        Ok(IndexSummary {
            kind: self.config.kind,
            metric: vector.metric(),
            dimension: stats.dimension,
            vectors: stats.vector_count,
            chunks: self.chunks.count()?,
            documents: self.chunks.list_documents()?.len(),
            keyword_docs: self.keyword_searcher.num_docs(),
            size_bytes: stats.size_bytes,
        })
    }
}
