//! Local BERT sentence embedder running on Candle.
//!
//! Token embeddings are mean-pooled over the attention mask and normalized.
//! The output dimension is read from the model's `config.json`.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Longest input kept per text, in tokens.
pub const MAX_SEQ_LENGTH: usize = 256;

/// Texts per forward pass.
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load from the cache, downloading the model on first use.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        let name = cache
            .repo_id
            .rsplit('/')
            .next()
            .unwrap_or(&cache.repo_id)
            .to_string();
        Self::load_from_paths(&name, &paths.config, &paths.tokenizer, &paths.weights)
    }

    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default())
    }

    pub fn load_from_paths(
        name: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        info!(model = name, "Loading embedding model");
        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path)?;
        let raw: serde_json::Value = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {e}")))?;
        let dimension = raw
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| EmbeddingError::ModelNotFound("config has no hidden_size".into()))?
            as usize;
        let config: BertConfig = serde_json::from_value(raw)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {e}")))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        info!(dim = dimension, max_seq = MAX_SEQ_LENGTH, "Model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                provider: "candle".to_string(),
                name: name.to_string(),
                dimension,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask
            .unsqueeze(2)?
            .broadcast_as(embeddings.shape())?
            .to_dtype(DType::F32)?;
        let summed = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        Ok(summed.broadcast_div(&counts)?)
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(MAX_SEQ_LENGTH);

        let mut ids_flat: Vec<u32> = Vec::with_capacity(texts.len() * max_len);
        let mut mask_flat: Vec<u32> = Vec::with_capacity(texts.len() * max_len);
        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            let mut ids = encoding.get_ids()[..len].to_vec();
            let mut mask = encoding.get_attention_mask()[..len].to_vec();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            ids_flat.extend(ids);
            mask_flat.extend(mask);
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(ids_flat, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(mask_flat, shape, &self.device)?;
        let token_type_ids = Tensor::zeros_like(&input_ids)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled: Vec<Vec<f32>> = self.mean_pooling(&output, &attention_mask)?.to_vec2()?;

        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidInput("model returned no embedding".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(DEFAULT_BATCH_SIZE) {
            debug!(count = batch.len(), "Embedding batch");
            out.extend(self.forward_batch(batch)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Run with: cargo test -p docqa-embeddings -- --ignored

    #[test]
    #[ignore = "requires model download"]
    fn test_load_model() {
        let embedder = CandleEmbedder::load_default().unwrap();
        assert_eq!(embedder.info().dimension, 384);
        assert_eq!(embedder.info().name, "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_embed_batch_larger_than_forward_pass() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let texts: Vec<String> = (0..DEFAULT_BATCH_SIZE + 5)
            .map(|i| format!("sentence number {i}"))
            .collect();
        let embeddings = embedder.embed_texts(&texts).unwrap();
        assert_eq!(embeddings.len(), texts.len());
        assert!(embeddings.iter().all(|e| e.dimension() == 384));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_related_passages_score_higher() {
        let embedder = CandleEmbedder::load_default().unwrap();
        let query = embedder.embed_query("How long do refunds take?").unwrap();
        let related = embedder
            .embed("Refunds are processed within 14 days of receiving the item.")
            .unwrap();
        let unrelated = embedder
            .embed("The office kitchen is cleaned every Friday.")
            .unwrap();

        assert!(query.cosine_similarity(&related) > query.cosine_similarity(&unrelated));
    }
}
