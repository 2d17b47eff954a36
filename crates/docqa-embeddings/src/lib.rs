//! # docqa-embeddings
//!
//! Text embeddings for document chunks and queries.
//!
//! ## Providers
//! - `candle`: local BERT sentence embedder (default all-MiniLM-L6-v2,
//!   384 dimensions), downloaded once from the HuggingFace Hub
//! - `openai` / `ollama`: HTTP embedding endpoints
//! - `hash`: deterministic feature hashing, for tests and offline runs
//!
//! All embeddings are normalized to unit length.

pub mod api;
pub mod cache;
pub mod candle;
pub mod error;
pub mod factory;
pub mod hash;
pub mod model;

pub use crate::candle::CandleEmbedder;
pub use api::{ApiEmbedder, ApiEmbedderConfig, ApiProvider};
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use factory::build_embedder;
pub use hash::HashEmbedder;
pub use model::{check_dimensions, Embedding, EmbeddingModel, ModelInfo};
