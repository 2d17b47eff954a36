//! Index selection by kind.

use std::path::Path;

use docqa_types::{DistanceMetric, IndexKind};

use crate::error::VectorError;
use crate::flat::{FlatConfig, FlatIndex};
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::index::VectorIndex;

/// Open (or create empty) the index of `kind` stored under `path`.
pub fn open_index(
    kind: IndexKind,
    metric: DistanceMetric,
    dimension: usize,
    path: &Path,
) -> Result<Box<dyn VectorIndex>, VectorError> {
    match kind {
        IndexKind::Flat => {
            let config = FlatConfig::new(dimension, path).with_metric(metric);
            Ok(Box::new(FlatIndex::open_or_create(config)?))
        }
        IndexKind::Hnsw => {
            let config = HnswConfig::new(dimension, path).with_metric(metric);
            Ok(Box::new(HnswIndex::open_or_create(config)?))
        }
    }
}

/// Whether an index of `kind` has been saved under `path`.
pub fn index_exists(path: &Path, kind: IndexKind) -> bool {
    match kind {
        IndexKind::Flat => FlatIndex::exists(path),
        IndexKind::Hnsw => HnswIndex::exists(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_embeddings::Embedding;
    use tempfile::TempDir;

    #[test]
    fn test_open_flat_and_persist() {
        let temp = TempDir::new().unwrap();
        assert!(!index_exists(temp.path(), IndexKind::Flat));

        let mut index = open_index(IndexKind::Flat, DistanceMetric::L2, 3, temp.path()).unwrap();
        index.add(1, &Embedding::new(vec![1.0, 0.0, 0.0])).unwrap();
        index.save().unwrap();

        assert!(index_exists(temp.path(), IndexKind::Flat));
        assert!(!index_exists(temp.path(), IndexKind::Hnsw));

        let reopened = open_index(IndexKind::Flat, DistanceMetric::L2, 3, temp.path()).unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_open_hnsw() {
        let temp = TempDir::new().unwrap();
        let index =
            open_index(IndexKind::Hnsw, DistanceMetric::Cosine, 8, temp.path()).unwrap();
        assert_eq!(index.dimension(), 8);
        assert_eq!(index.metric(), DistanceMetric::Cosine);
        assert!(index.is_empty());
    }
}
