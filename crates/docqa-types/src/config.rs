//! Configuration loading for docqa.
//!
//! Layered: built-in defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/docqa/config.toml.

use config::{Config, Environment, File};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::document::RetrievalMode;
use crate::error::DocqaError;

/// Which vector index backs similarity search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact search over every stored vector
    #[default]
    Flat,
    /// Approximate search (usearch HNSW graph)
    Hnsw,
}

/// Distance used by the vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Squared euclidean distance, lower is closer
    #[default]
    L2,
    /// Cosine similarity, higher is closer
    Cosine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSettings {
    /// Descend into subdirectories of the documents directory
    #[serde(default)]
    pub recursive: bool,

    /// Strip special characters and collapse whitespace before chunking
    #[serde(default = "default_true")]
    pub clean_text: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            recursive: false,
            clean_text: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters carried over between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1500
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

/// Embedding backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name: "candle", "openai", "ollama" or "hash"
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model identifier (HuggingFace repo id for candle)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Output dimension of the model
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// API base URL for HTTP providers
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key (prefer the provider's env var over storing it in a file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Texts per embedding request
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_provider() -> String {
    "candle".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_embedding_dimension() -> usize {
    384
}

fn default_embedding_batch_size() -> usize {
    100
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            base_url: None,
            api_key: None,
            batch_size: default_embedding_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub kind: IndexKind,

    #[serde(default)]
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Chunks returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Largest `top_k` a query may ask for
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    #[serde(default)]
    pub mode: RetrievalMode,

    /// Weight of the BM25 list in hybrid fusion
    #[serde(default = "default_weight")]
    pub bm25_weight: f32,

    /// Weight of the vector list in hybrid fusion
    #[serde(default = "default_weight")]
    pub vector_weight: f32,
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

fn default_weight() -> f32 {
    0.5
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            mode: RetrievalMode::default(),
            bm25_weight: default_weight(),
            vector_weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Model profile used when a query does not name one
    #[serde(default = "default_model_name")]
    pub default_model: String,

    /// Prompt with {context}, {history} and {question} placeholders
    #[serde(default)]
    pub prompt_template: Option<String>,

    /// Token budget for the retrieved context block
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Conversation turns kept per conversation
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Conversations remembered at once; the least recently used is
    /// forgotten first
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,

    /// Ask the model for follow-up questions after each answer
    #[serde(default = "default_true")]
    pub suggestions: bool,
}

fn default_model_name() -> String {
    "llama3.1".to_string()
}

fn default_max_context_tokens() -> usize {
    3000
}

fn default_history_turns() -> usize {
    10
}

fn default_max_conversations() -> usize {
    1000
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            default_model: default_model_name(),
            prompt_template: None,
            max_context_tokens: default_max_context_tokens(),
            history_turns: default_history_turns(),
            max_conversations: default_max_conversations(),
            suggestions: true,
        }
    }
}

/// One named language model the service can answer with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Provider name: "openai", "anthropic" or "ollama"
    pub provider: String,

    /// Model name sent to the provider
    pub model: String,

    /// API base URL (provider default when unset)
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key (falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

impl ModelProfile {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_models() -> BTreeMap<String, ModelProfile> {
    let mut models = BTreeMap::new();
    let mut llama = ModelProfile::new("ollama", "llama3.1");
    llama.base_url = Some("http://localhost:11434".to_string());
    models.insert("llama3.1".to_string(), llama);
    models.insert(
        "gpt-3.5-turbo".to_string(),
        ModelProfile::new("openai", "gpt-3.5-turbo"),
    );
    models
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Maximum request body for uploads, in megabytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_max_upload_mb() -> usize {
    50
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory scanned for source documents; uploads land here too
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Directory holding the vector index, chunk store and BM25 index
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_http_host")]
    pub http_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub extraction: ExtractionSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub generation: GenerationSettings,

    /// Named model profiles
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelProfile>,

    #[serde(default)]
    pub server: ServerSettings,
}

fn default_documents_dir() -> String {
    "./documents".to_string()
}

fn default_data_dir() -> String {
    ProjectDirs::from("", "", "docqa")
        .map(|p| p.data_local_dir().join("index"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            data_dir: default_data_dir(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            log_level: default_log_level(),
            extraction: ExtractionSettings::default(),
            chunking: ChunkingSettings::default(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            retrieval: RetrievalSettings::default(),
            generation: GenerationSettings::default(),
            models: default_models(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/docqa/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DOCQA_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, DocqaError> {
        let config_dir = ProjectDirs::from("", "", "docqa")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults for the top-level scalars; nested tables
            // fall back to their serde defaults
            .set_default("documents_dir", default_documents_dir())
            .map_err(|e| DocqaError::Config(e.to_string()))?
            .set_default("data_dir", default_data_dir())
            .map_err(|e| DocqaError::Config(e.to_string()))?
            .set_default("http_host", default_http_host())
            .map_err(|e| DocqaError::Config(e.to_string()))?
            .set_default("http_port", default_http_port() as i64)
            .map_err(|e| DocqaError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| DocqaError::Config(e.to_string()))?
            // 2. Default config file
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DOCQA_HTTP_PORT, DOCQA_CHUNKING__CHUNK_SIZE, DOCQA_EMBEDDING__PROVIDER, ...
        builder = builder.add_source(
            Environment::with_prefix("DOCQA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings: Settings = builder
            .build()
            .map_err(|e| DocqaError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| DocqaError::Config(e.to_string()))?;

        // Built-in profiles stay available unless a file redefines them
        for (name, profile) in default_models() {
            settings.models.entry(name).or_insert(profile);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), DocqaError> {
        if self.chunking.chunk_size == 0 {
            return Err(DocqaError::Config("chunk_size must be > 0".into()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(DocqaError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(DocqaError::Config("top_k must be > 0".into()));
        }
        if self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(DocqaError::Config(format!(
                "top_k ({}) must not exceed max_top_k ({})",
                self.retrieval.top_k, self.retrieval.max_top_k
            )));
        }
        if self.retrieval.bm25_weight < 0.0 || self.retrieval.vector_weight < 0.0 {
            return Err(DocqaError::Config("fusion weights must be >= 0".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(DocqaError::Config("embedding dimension must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(DocqaError::Config("embedding batch_size must be > 0".into()));
        }
        if !self.models.contains_key(&self.generation.default_model) {
            return Err(DocqaError::Config(format!(
                "default model '{}' has no profile in [models]",
                self.generation.default_model
            )));
        }
        Ok(())
    }

    /// Socket address for the HTTP server
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn expanded_documents_dir(&self) -> PathBuf {
        expand_home(&self.documents_dir)
    }

    pub fn expanded_data_dir(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }

    pub fn vector_index_path(&self) -> PathBuf {
        self.expanded_data_dir().join("vectors")
    }

    pub fn chunk_store_path(&self) -> PathBuf {
        self.expanded_data_dir().join("chunks")
    }

    pub fn search_index_path(&self) -> PathBuf {
        self.expanded_data_dir().join("bm25")
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = UserDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
