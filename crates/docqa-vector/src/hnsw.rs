//! Approximate HNSW index using usearch.
//!
//! Graph parameters:
//! - M = 16 (connections per layer)
//! - ef_construction = 200
//! - ef_search = 100

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use docqa_embeddings::Embedding;
use docqa_types::DistanceMetric;
use tracing::{debug, info};
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::error::VectorError;
use crate::index::{check_dimension, IndexStats, SearchResult, VectorIndex};

pub const HNSW_INDEX_FILE: &str = "hnsw.usearch";

#[derive(Debug, Clone)]
pub struct HnswConfig {
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Connections per layer (M)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Directory holding `hnsw.usearch`
    pub index_path: PathBuf,
    /// Initial reservation; grows by doubling when full
    pub capacity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            metric: DistanceMetric::Cosine,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            index_path: PathBuf::from("./vectors"),
            capacity: 10_000,
        }
    }
}

impl HnswConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: match self.metric {
                DistanceMetric::L2 => MetricKind::L2sq,
                DistanceMetric::Cosine => MetricKind::Cos,
            },
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false,
        }
    }
}

/// HNSW index wrapper around usearch.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

fn index_err(e: impl std::fmt::Display) -> VectorError {
    VectorError::Index(e.to_string())
}

fn path_str(path: &Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

impl HnswIndex {
    /// Open the index under `config.index_path`, creating an empty one if
    /// no file exists yet.
    pub fn open_or_create(config: HnswConfig) -> Result<Self, VectorError> {
        let index_file = config.index_path.join(HNSW_INDEX_FILE);
        let options = config.options();

        let index = if index_file.exists() {
            info!(path = ?index_file, "Opening existing vector index");
            let idx = Index::new(&options).map_err(index_err)?;
            idx.load(path_str(&index_file)?)
                .map_err(|e| VectorError::Index(format!("Failed to load: {e}")))?;
            if idx.dimensions() != config.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: config.dimension,
                    actual: idx.dimensions(),
                });
            }
            idx
        } else {
            info!(path = ?index_file, dim = config.dimension, "Creating new vector index");
            std::fs::create_dir_all(&config.index_path)?;
            let idx = Index::new(&options).map_err(index_err)?;
            idx.reserve(config.capacity).map_err(index_err)?;
            idx
        };

        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(HNSW_INDEX_FILE)
    }

    pub fn exists(index_path: &Path) -> bool {
        index_path.join(HNSW_INDEX_FILE).exists()
    }
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    fn len(&self) -> usize {
        self.index.read().map(|idx| idx.size()).unwrap_or(0)
    }

    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        check_dimension(self.config.dimension, embedding)?;

        let index = self.index.write().map_err(|_| VectorError::LockPoisoned)?;
        if index.contains(id) {
            return Err(VectorError::DuplicateId(id));
        }
        if index.size() >= index.capacity() {
            let grown = (index.capacity() * 2).max(self.config.capacity);
            index.reserve(grown).map_err(index_err)?;
        }
        index.add(id, &embedding.values).map_err(index_err)?;

        debug!(id = id, "Added vector");
        Ok(())
    }

    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError> {
        check_dimension(self.config.dimension, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let index = self.index.read().map_err(|_| VectorError::LockPoisoned)?;
        if index.size() == 0 {
            return Ok(Vec::new());
        }
        let results = index.search(&query.values, k).map_err(index_err)?;

        let metric = self.config.metric;
        let search_results: Vec<SearchResult> = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .map(|(&id, &dist)| match metric {
                DistanceMetric::L2 => SearchResult::new(id, dist),
                DistanceMetric::Cosine => SearchResult::new(id, 1.0 - dist),
            })
            .collect();

        debug!(k = k, found = search_results.len(), "Search complete");
        Ok(search_results)
    }

    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    fn remove(&mut self, id: u64) -> Result<bool, VectorError> {
        let index = self.index.write().map_err(|_| VectorError::LockPoisoned)?;
        let removed = index.remove(id).map_err(index_err)?;

        if removed > 0 {
            debug!(id = id, "Removed vector");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.index
            .read()
            .map(|idx| idx.contains(id))
            .unwrap_or(false)
    }

    fn stats(&self) -> IndexStats {
        let size_bytes = std::fs::metadata(self.index_file())
            .map(|m| m.len())
            .unwrap_or(0);
        match self.index.read() {
            Ok(index) => IndexStats {
                vector_count: index.size(),
                dimension: self.config.dimension,
                size_bytes,
                available: true,
            },
            Err(_) => IndexStats {
                dimension: self.config.dimension,
                size_bytes,
                ..Default::default()
            },
        }
    }

    fn save(&self) -> Result<(), VectorError> {
        std::fs::create_dir_all(&self.config.index_path)?;
        let index = self.index.read().map_err(|_| VectorError::LockPoisoned)?;
        let path = self.index_file();
        index
            .save(path_str(&path)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {e}")))?;

        info!(path = ?path, vectors = index.size(), "Saved vector index");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), VectorError> {
        let new_index = Index::new(&self.config.options()).map_err(index_err)?;
        new_index.reserve(self.config.capacity).map_err(index_err)?;

        *self.index.write().map_err(|_| VectorError::LockPoisoned)? = new_index;
        info!("Cleared vector index");
        Ok(())
    }
}
