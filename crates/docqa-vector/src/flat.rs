//! Exact (brute force) vector index.
//!
//! Vectors are kept in insertion order in one contiguous buffer and every
//! search scans all of them. Persisted as JSON in `flat.json`.

use docqa_embeddings::Embedding;
use docqa_types::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::VectorError;
use crate::index::{check_dimension, IndexStats, SearchResult, VectorIndex};

pub const FLAT_INDEX_FILE: &str = "flat.json";

#[derive(Debug, Clone)]
pub struct FlatConfig {
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Directory holding `flat.json`
    pub index_path: PathBuf,
}

impl FlatConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            metric: DistanceMetric::L2,
            index_path: index_path.into(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct FlatFile {
    dimension: usize,
    metric: DistanceMetric,
    ids: Vec<u64>,
    vectors: Vec<f32>,
}

pub struct FlatIndex {
    config: FlatConfig,
    ids: Vec<u64>,
    /// Row-major, `ids.len() * dimension` values
    vectors: Vec<f32>,
    positions: HashMap<u64, usize>,
}

impl FlatIndex {
    /// Empty in-memory index; `save` writes under `config.index_path`.
    pub fn new(config: FlatConfig) -> Self {
        Self {
            config,
            ids: Vec::new(),
            vectors: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Load `flat.json` when present, otherwise start empty.
    ///
    /// A persisted index with a different dimension is an error rather
    /// than being silently replaced.
    pub fn open_or_create(config: FlatConfig) -> Result<Self, VectorError> {
        let file = config.index_path.join(FLAT_INDEX_FILE);
        if !file.exists() {
            info!(path = ?file, dim = config.dimension, "Creating new flat index");
            std::fs::create_dir_all(&config.index_path)?;
            return Ok(Self::new(config));
        }

        let bytes = std::fs::read(&file)?;
        let stored: FlatFile = serde_json::from_slice(&bytes)
            .map_err(|e| VectorError::Serialization(format!("{}: {e}", file.display())))?;
        if stored.dimension != config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: config.dimension,
                actual: stored.dimension,
            });
        }
        if stored.metric != config.metric {
            return Err(VectorError::MetricMismatch {
                expected: config.metric,
                actual: stored.metric,
            });
        }
        if stored.vectors.len() != stored.ids.len() * stored.dimension {
            return Err(VectorError::Serialization(format!(
                "{}: {} values for {} vectors of dimension {}",
                file.display(),
                stored.vectors.len(),
                stored.ids.len(),
                stored.dimension
            )));
        }

        let positions = stored
            .ids
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos))
            .collect();
        info!(path = ?file, vectors = stored.ids.len(), "Opened flat index");
        Ok(Self {
            config,
            ids: stored.ids,
            vectors: stored.vectors,
            positions,
        })
    }

    pub fn index_file(&self) -> PathBuf {
        self.config.index_path.join(FLAT_INDEX_FILE)
    }

    /// Whether a persisted flat index exists under `index_path`.
    pub fn exists(index_path: &Path) -> bool {
        index_path.join(FLAT_INDEX_FILE).exists()
    }

    fn row(&self, pos: usize) -> &[f32] {
        let dim = self.config.dimension;
        &self.vectors[pos * dim..(pos + 1) * dim]
    }

    fn score(&self, query: &[f32], row: &[f32]) -> f32 {
        match self.config.metric {
            DistanceMetric::L2 => query
                .iter()
                .zip(row)
                .map(|(a, b)| (a - b) * (a - b))
                .sum(),
            DistanceMetric::Cosine => {
                let dot: f32 = query.iter().zip(row).map(|(a, b)| a * b).sum();
                let nq: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
                let nr: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
                if nq == 0.0 || nr == 0.0 {
                    0.0
                } else {
                    dot / (nq * nr)
                }
            }
        }
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.config.metric
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn add(&mut self, id: u64, embedding: &Embedding) -> Result<(), VectorError> {
        check_dimension(self.config.dimension, embedding)?;
        if self.positions.contains_key(&id) {
            return Err(VectorError::DuplicateId(id));
        }
        self.positions.insert(id, self.ids.len());
        self.ids.push(id);
        self.vectors.extend_from_slice(&embedding.values);
        Ok(())
    }

    fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchResult>, VectorError> {
        check_dimension(self.config.dimension, query)?;
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<SearchResult> = self
            .ids
            .iter()
            .enumerate()
            .map(|(pos, id)| SearchResult::new(*id, self.score(&query.values, self.row(pos))))
            .collect();

        // Ties keep insertion order (sort is stable)
        let metric = self.config.metric;
        scored.sort_by(|a, b| {
            let ord = a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal);
            match metric {
                DistanceMetric::L2 => ord,
                DistanceMetric::Cosine => ord.reverse(),
            }
        });
        scored.truncate(k);

        debug!(k = k, found = scored.len(), "Flat search complete");
        Ok(scored)
    }

    fn remove(&mut self, id: u64) -> Result<bool, VectorError> {
        let Some(pos) = self.positions.remove(&id) else {
            return Ok(false);
        };
        let dim = self.config.dimension;
        self.ids.remove(pos);
        self.vectors.drain(pos * dim..(pos + 1) * dim);
        for later in self.ids[pos..].iter() {
            if let Some(p) = self.positions.get_mut(later) {
                *p -= 1;
            }
        }
        debug!(id = id, "Removed vector");
        Ok(true)
    }

    fn contains(&self, id: u64) -> bool {
        self.positions.contains_key(&id)
    }

    fn stats(&self) -> IndexStats {
        IndexStats {
            vector_count: self.ids.len(),
            dimension: self.config.dimension,
            size_bytes: std::fs::metadata(self.index_file())
                .map(|m| m.len())
                .unwrap_or(0),
            available: true,
        }
    }

    fn save(&self) -> Result<(), VectorError> {
        std::fs::create_dir_all(&self.config.index_path)?;
        let file = FlatFile {
            dimension: self.config.dimension,
            metric: self.config.metric,
            ids: self.ids.clone(),
            vectors: self.vectors.clone(),
        };
        let bytes =
            serde_json::to_vec(&file).map_err(|e| VectorError::Serialization(e.to_string()))?;

        // Write then rename so readers never see a half-written file
        let path = self.index_file();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;

        info!(path = ?path, vectors = self.ids.len(), "Saved flat index");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), VectorError> {
        self.ids.clear();
        self.vectors.clear();
        self.positions.clear();
        info!("Cleared flat index");
        Ok(())
    }
}
