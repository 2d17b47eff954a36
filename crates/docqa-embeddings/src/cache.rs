//! Local model file cache backed by the HuggingFace Hub.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::EmbeddingError;

/// Default local model: small, 384-dimensional sentence embedder.
pub const DEFAULT_MODEL_REPO: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Files a BERT-style sentence embedder needs.
pub const MODEL_FILES: &[&str] = &["config.json", "tokenizer.json", "model.safetensors"];

#[derive(Debug, Clone)]
pub struct ModelCache {
    pub cache_dir: PathBuf,
    pub repo_id: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::for_repo(DEFAULT_MODEL_REPO)
    }
}

impl ModelCache {
    pub fn new(cache_dir: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            repo_id: repo_id.into(),
        }
    }

    /// Cache rooted in the user's cache directory (`~/.cache/docqa/models`).
    pub fn for_repo(repo_id: impl Into<String>) -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("docqa")
            .join("models");
        Self::new(cache_dir, repo_id)
    }

    /// Directory holding this repo's files; `/` in the repo id becomes `_`.
    pub fn model_dir(&self) -> PathBuf {
        self.cache_dir.join(self.repo_id.replace('/', "_"))
    }

    pub fn is_cached(&self) -> bool {
        let model_dir = self.model_dir();
        MODEL_FILES.iter().all(|f| model_dir.join(f).exists())
    }

    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.model_dir().join(filename)
    }
}

#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Return the model's file paths, downloading anything missing first.
pub fn get_or_download_model(cache: &ModelCache) -> Result<ModelPaths, EmbeddingError> {
    if cache.is_cached() {
        debug!(path = ?cache.model_dir(), "Using cached model");
    } else {
        info!(repo = %cache.repo_id, "Downloading model files");
        download_model_files(cache)?;
    }

    Ok(ModelPaths {
        config: cache.file_path("config.json"),
        tokenizer: cache.file_path("tokenizer.json"),
        weights: cache.file_path("model.safetensors"),
    })
}

fn download_model_files(cache: &ModelCache) -> Result<(), EmbeddingError> {
    use hf_hub::api::sync::Api;

    let api = Api::new().map_err(|e| EmbeddingError::Download(e.to_string()))?;
    let repo = api.model(cache.repo_id.clone());

    std::fs::create_dir_all(cache.model_dir())?;

    for filename in MODEL_FILES {
        let dest = cache.file_path(filename);
        if dest.exists() {
            continue;
        }
        info!(file = filename, "Downloading");
        let source = repo
            .get(filename)
            .map_err(|e| EmbeddingError::Download(format!("{filename}: {e}")))?;
        std::fs::copy(&source, &dest)?;
        debug!(file = filename, dest = ?dest, "Downloaded");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_default_location() {
        let cache = ModelCache::default();
        assert!(cache.cache_dir.to_string_lossy().contains("docqa"));
        assert_eq!(cache.repo_id, DEFAULT_MODEL_REPO);
    }

    #[test]
    fn test_model_dir_flattens_repo_id() {
        let cache = ModelCache::new("/tmp/models", "BAAI/bge-small-en-v1.5");
        assert_eq!(
            cache.model_dir(),
            PathBuf::from("/tmp/models/BAAI_bge-small-en-v1.5")
        );
    }

    #[test]
    fn test_is_cached_requires_every_file() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "test/model");
        assert!(!cache.is_cached());

        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(cache.file_path("config.json"), "{}").unwrap();
        std::fs::write(cache.file_path("tokenizer.json"), "{}").unwrap();
        assert!(!cache.is_cached());

        std::fs::write(cache.file_path("model.safetensors"), "").unwrap();
        assert!(cache.is_cached());
    }
}
