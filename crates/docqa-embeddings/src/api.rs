//! HTTP embedding providers (OpenAI and Ollama).
//!
//! Uses the blocking reqwest client, so construct, call and drop an
//! [`ApiEmbedder`] off the async runtime (e.g. inside `spawn_blocking`).

use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::EmbeddingError;
use crate::model::{check_dimensions, Embedding, EmbeddingModel, ModelInfo};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiProvider {
    /// `POST {base}/embeddings`, bearer auth
    OpenAi,
    /// `POST {base}/api/embed`, no auth
    Ollama,
}

#[derive(Debug, Clone)]
pub struct ApiEmbedderConfig {
    pub provider: ApiProvider,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<SecretString>,
    /// Texts per request
    pub batch_size: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl ApiEmbedderConfig {
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider: ApiProvider::OpenAi,
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            dimension,
            api_key: Some(SecretString::from(api_key.into())),
            batch_size: 100,
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn ollama(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            provider: ApiProvider::Ollama,
            base_url: OLLAMA_BASE_URL.to_string(),
            model: model.into(),
            dimension,
            api_key: None,
            batch_size: 100,
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

/// A request failure, split by whether retrying can help.
enum Attempt {
    Retry(EmbeddingError),
    Fatal(EmbeddingError),
}

pub struct ApiEmbedder {
    client: Client,
    config: ApiEmbedderConfig,
    info: ModelInfo,
}

impl ApiEmbedder {
    pub fn new(config: ApiEmbedderConfig) -> Result<Self, EmbeddingError> {
        if config.batch_size == 0 {
            return Err(EmbeddingError::Config("batch_size must be > 0".into()));
        }
        if config.provider == ApiProvider::OpenAi && config.api_key.is_none() {
            return Err(EmbeddingError::Config(
                "OpenAI embeddings need an API key (embedding.api_key or OPENAI_API_KEY)".into(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let info = ModelInfo {
            provider: match config.provider {
                ApiProvider::OpenAi => "openai",
                ApiProvider::Ollama => "ollama",
            }
            .to_string(),
            name: config.model.clone(),
            dimension: config.dimension,
            max_sequence_length: 0,
        };
        Ok(Self {
            client,
            config,
            info,
        })
    }

    fn request_with_retry(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, count = texts.len(), "Calling embedding API");

            let err = match self.request(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => e,
            };

            if attempts >= self.config.max_retries.max(1) {
                error!(error = %err, "Max retries exceeded");
                return Err(err);
            }
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!(error = %err, retry_in_ms = delay.as_millis(), "Embedding call failed, retrying");
                    std::thread::sleep(delay);
                }
                None => return Err(err),
            }
        }
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, Attempt> {
        #[derive(Serialize)]
        struct EmbedRequest<'a> {
            model: &'a str,
            input: &'a [&'a str],
        }

        let url = match self.config.provider {
            ApiProvider::OpenAi => format!("{}/embeddings", self.config.base_url),
            ApiProvider::Ollama => format!("{}/api/embed", self.config.base_url),
        };
        let mut request = self.client.post(&url).json(&EmbedRequest {
            model: &self.config.model,
            input: texts,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| Attempt::Retry(EmbeddingError::Api(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let err = EmbeddingError::Api(format!("HTTP {status}: {body}"));
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    Attempt::Retry(err)
                } else {
                    Attempt::Fatal(err)
                },
            );
        }

        let body = response
            .text()
            .map_err(|e| Attempt::Retry(EmbeddingError::Api(e.to_string())))?;
        self.parse(&body).map_err(Attempt::Fatal)
    }

    fn parse(&self, body: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        #[derive(Deserialize)]
        struct OpenAiResponse {
            data: Vec<OpenAiItem>,
        }

        #[derive(Deserialize)]
        struct OpenAiItem {
            index: usize,
            embedding: Vec<f32>,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embeddings: Vec<Vec<f32>>,
        }

        let parse_err = |e: serde_json::Error| EmbeddingError::Serialization(e.to_string());
        match self.config.provider {
            ApiProvider::OpenAi => {
                let mut parsed: OpenAiResponse = serde_json::from_str(body).map_err(parse_err)?;
                parsed.data.sort_by_key(|item| item.index);
                Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
            }
            ApiProvider::Ollama => {
                let parsed: OllamaResponse = serde_json::from_str(body).map_err(parse_err)?;
                Ok(parsed.embeddings)
            }
        }
    }
}

impl EmbeddingModel for ApiEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Api("empty embedding response".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            let vectors = self.request_with_retry(batch)?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::Api(format!(
                    "requested {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            let embeddings: Vec<Embedding> = vectors.into_iter().map(Embedding::new).collect();
            check_dimensions(&embeddings, self.info.dimension)?;
            out.extend(embeddings);
        }
        Ok(out)
    }
}
