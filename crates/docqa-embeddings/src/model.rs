//! Embedding model trait and types.

use crate::error::EmbeddingError;

/// A unit-length embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Normalizes `values` to unit length. The zero vector is kept as is.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            values.into_iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]; 0.0 when dimensions differ.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Static facts about an embedding model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Provider that serves the model ("candle", "openai", "ollama", "hash")
    pub provider: String,
    pub name: String,
    pub dimension: usize,
    /// Maximum input length in tokens (0 when the provider does not say)
    pub max_sequence_length: usize,
}

/// Turns text into embeddings.
///
/// Implementations block (model inference or HTTP calls), so async code
/// should call them from `spawn_blocking`.
pub trait EmbeddingModel: Send + Sync {
    fn info(&self) -> &ModelInfo;

    fn dimension(&self) -> usize {
        self.info().dimension
    }

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed many texts; the default calls [`EmbeddingModel::embed`] per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }

    /// Embed a search query. Same as `embed` unless the model wants queries
    /// phrased differently from passages.
    fn embed_query(&self, query: &str) -> Result<Embedding, EmbeddingError> {
        self.embed(query)
    }
}

/// Fail with `DimensionMismatch` unless every embedding has `expected` values.
pub fn check_dimensions(embeddings: &[Embedding], expected: usize) -> Result<(), EmbeddingError> {
    match embeddings.iter().find(|e| e.dimension() != expected) {
        Some(bad) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: bad.dimension(),
        }),
        None => Ok(()),
    }
}
