//! Builds the configured embedder.

use docqa_types::EmbeddingSettings;
use std::sync::Arc;
use tracing::info;

use crate::api::{ApiEmbedder, ApiEmbedderConfig};
use crate::cache::ModelCache;
use crate::candle::CandleEmbedder;
use crate::error::EmbeddingError;
use crate::hash::HashEmbedder;
use crate::model::EmbeddingModel;

/// Build the embedder named by `settings.provider`.
///
/// Candle downloads the model on first use and HTTP providers create a
/// blocking client, so call this from a blocking context.
pub fn build_embedder(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
    let embedder: Arc<dyn EmbeddingModel> = match settings.provider.to_ascii_lowercase().as_str() {
        "candle" | "local" => {
            let embedder = CandleEmbedder::load(&ModelCache::for_repo(&settings.model))?;
            if embedder.info().dimension != settings.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: settings.dimension,
                    actual: embedder.info().dimension,
                });
            }
            Arc::new(embedder)
        }
        "openai" => {
            let key = settings
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    EmbeddingError::Config(
                        "OpenAI embeddings need embedding.api_key or OPENAI_API_KEY".into(),
                    )
                })?;
            let mut config = ApiEmbedderConfig::openai(key, &settings.model, settings.dimension);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            config.batch_size = settings.batch_size;
            Arc::new(ApiEmbedder::new(config)?)
        }
        "ollama" => {
            let mut config = ApiEmbedderConfig::ollama(&settings.model, settings.dimension);
            if let Some(url) = &settings.base_url {
                config = config.with_base_url(url);
            }
            config.batch_size = settings.batch_size;
            Arc::new(ApiEmbedder::new(config)?)
        }
        "hash" => Arc::new(HashEmbedder::new(settings.dimension)?),
        other => {
            return Err(EmbeddingError::Config(format!(
                "unknown embedding provider: {other}"
            )))
        }
    };

    info!(
        provider = %embedder.info().provider,
        model = %embedder.info().name,
        dim = embedder.dimension(),
        "Embedder ready"
    );
    Ok(embedder)
}
