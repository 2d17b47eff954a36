//! Feature-hashing embedder.
//!
//! Lowercased word unigrams and bigrams are hashed (FNV-1a) into a fixed
//! number of buckets with a hash-derived sign. Texts sharing vocabulary end
//! up close together, which is enough for offline use and deterministic
//! tests. It has no notion of synonyms.

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    info: ModelInfo,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::Config("dimension must be > 0".into()));
        }
        Ok(Self {
            info: ModelInfo {
                provider: "hash".to_string(),
                name: format!("hash-{dimension}"),
                dimension,
                max_sequence_length: 0,
            },
        })
    }

    fn add_feature(&self, values: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let bucket = (hash % self.info.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        values[bucket] += sign * weight;
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl EmbeddingModel for HashEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut values = vec![0.0f32; self.info.dimension];
        let words = tokens(text);
        for word in &words {
            self.add_feature(&mut values, word, 1.0);
        }
        for pair in words.windows(2) {
            self.add_feature(&mut values, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        Ok(Embedding::new(values))
    }
}
