//! Question answering over the document index.
//!
//! [`DocumentQaService`] owns every piece of runtime state: the index, the
//! extraction pipeline, the generators and conversation memory. Handlers
//! receive it through an `Arc`; nothing lives in globals.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docqa_embeddings::EmbeddingModel;
use docqa_generate::{
    build_context, ConversationMemory, GenerationRequest, GeneratorRegistry, PromptTemplate,
    TokenCounter,
};
use docqa_indexing::{DocumentIndex, IndexingConfig, ScoredChunk};
use docqa_types::{
    Answer, Chunk, DistanceMetric, DocumentSummary, IndexKind, Reference, RetrievalMode, Settings,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::fusion::fuse_rrf;
use crate::pipeline::{DocumentPipeline, IngestReport, SyncReport};

/// Body of `POST /query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<RetrievalMode>,
    /// Ties the question to earlier turns of the same conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub documents_dir: PathBuf,
    pub index_kind: IndexKind,
    pub metric: DistanceMetric,
    pub dimension: usize,
    pub vectors: usize,
    pub chunks: usize,
    pub documents: usize,
    pub keyword_docs: u64,
    pub index_size_bytes: u64,
    pub embedding_model: String,
    pub default_model: String,
    pub models: Vec<String>,
    pub retrieval_mode: RetrievalMode,
}

pub struct DocumentQaService {
    settings: Settings,
    index: Arc<DocumentIndex>,
    pipeline: Arc<DocumentPipeline>,
    generators: GeneratorRegistry,
    template: PromptTemplate,
    tokens: TokenCounter,
    memory: ConversationMemory,
    /// Serializes syncs and uploads
    write_lock: Mutex<()>,
    started_at: DateTime<Utc>,
}

impl DocumentQaService {
    /// Open the stores and build the index when it is missing on disk, out
    /// of step, or empty.
    pub async fn open(
        settings: Settings,
        embedder: Arc<dyn EmbeddingModel>,
        generators: GeneratorRegistry,
    ) -> Result<Self, ServiceError> {
        let template = PromptTemplate::from_option(settings.generation.prompt_template.as_deref())?;
        let pipeline = Arc::new(DocumentPipeline::from_settings(&settings)?);

        let config = IndexingConfig::from_settings(&settings);
        let index = tokio::task::spawn_blocking(move || DocumentIndex::open(config, embedder))
            .await??;

        let service = Self {
            memory: ConversationMemory::new(
                settings.generation.history_turns,
                settings.generation.max_conversations,
            ),
            settings,
            index: Arc::new(index),
            pipeline,
            generators,
            template,
            tokens: TokenCounter::new(),
            write_lock: Mutex::new(()),
            started_at: Utc::now(),
        };

        let index = Arc::clone(&service.index);
        let rebuild = tokio::task::spawn_blocking(move || -> Result<bool, ServiceError> {
            Ok(index.needs_rebuild()? || index.summary()?.vectors == 0)
        })
        .await??;
        if rebuild {
            info!("Building index from documents directory");
            service.sync_documents().await?;
        }

        Ok(service)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    /// Rebuild both indexes from the documents directory.
    pub async fn sync_documents(&self) -> Result<SyncReport, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let index = Arc::clone(&self.index);
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.sync(&index)).await?
    }

    /// Save an uploaded file into the documents directory and index it.
    pub async fn ingest_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestReport, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let index = Arc::clone(&self.index);
        let pipeline = Arc::clone(&self.pipeline);
        let file_name = file_name.to_string();
        tokio::task::spawn_blocking(move || pipeline.ingest(&index, &file_name, &bytes)).await?
    }

    /// Path of a stored document, for download.
    pub fn document_path(&self, file_name: &str) -> Result<PathBuf, ServiceError> {
        let path = self.pipeline.document_path(file_name)?;
        if !path.is_file() {
            return Err(ServiceError::NotFound(file_name.to_string()));
        }
        Ok(path)
    }

    /// Top chunks for `query`, best first. `top_k` is capped at
    /// `retrieval.max_top_k`.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        mode: RetrievalMode,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        let top_k = top_k.min(self.settings.retrieval.max_top_k);
        let index = Arc::clone(&self.index);
        let query = query.to_string();
        let vector_weight = self.settings.retrieval.vector_weight;
        let bm25_weight = self.settings.retrieval.bm25_weight;

        let hits = tokio::task::spawn_blocking(move || -> Result<_, ServiceError> {
            match mode {
                RetrievalMode::Vector => Ok(index.search_vector(&query, top_k)?),
                RetrievalMode::Keyword => Ok(index.search_keyword(&query, top_k)?),
                RetrievalMode::Hybrid => {
                    let fetch_k = top_k.saturating_mul(2);
                    let vector = index.search_vector(&query, fetch_k)?;
                    let keyword = index.search_keyword(&query, fetch_k)?;
                    Ok(fuse_rrf(
                        &[(vector.as_slice(), vector_weight), (keyword.as_slice(), bm25_weight)],
                        top_k,
                    ))
                }
            }
        })
        .await??;

        debug!(mode = %mode, top_k, found = hits.len(), "Retrieved chunks");
        Ok(hits)
    }

    /// Retrieve, prompt the model and return the answer with references.
    pub async fn answer(&self, request: QueryRequest) -> Result<Answer, ServiceError> {
        let question = request.query.trim();
        if question.is_empty() {
            return Err(ServiceError::InvalidInput("query must not be empty".into()));
        }
        let top_k = request.top_k.unwrap_or(self.settings.retrieval.top_k);
        if top_k == 0 {
            return Err(ServiceError::InvalidInput("top_k must be > 0".into()));
        }
        let max_top_k = self.settings.retrieval.max_top_k;
        if top_k > max_top_k {
            return Err(ServiceError::InvalidInput(format!(
                "top_k must be at most {max_top_k}"
            )));
        }
        let mode = request.mode.unwrap_or(self.settings.retrieval.mode);
        let generator = self.generators.get(request.model.as_deref())?;

        let hits = self.retrieve(question, top_k, mode).await?;
        let chunks: Vec<Chunk> = hits.iter().map(|h| h.chunk.clone()).collect();
        let context = build_context(
            &chunks,
            self.settings.generation.max_context_tokens,
            &self.tokens,
        );
        let history = request
            .conversation_id
            .as_deref()
            .map(|id| self.memory.render(id))
            .unwrap_or_default();

        let prompt = self.template.render(&context, &history, question);
        let generation = GenerationRequest::new(prompt).with_parts(question, context);
        let answer = generator.generate(&generation).await?;

        if let Some(id) = request.conversation_id.as_deref() {
            self.memory.record(id, question, &answer);
        }

        let suggestions = if self.settings.generation.suggestions {
            match generator.suggest(question, &answer).await {
                Ok(suggestions) => suggestions,
                Err(e) => {
                    warn!(model = generator.name(), error = %e, "Suggestion request failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        info!(
            model = generator.name(),
            mode = %mode,
            references = hits.len(),
            "Answered query"
        );
        Ok(Answer {
            answer,
            references: hits
                .iter()
                .map(|h| Reference::from_chunk(&h.chunk, h.score))
                .collect(),
            suggestions,
            model: generator.name().to_string(),
            conversation_id: request.conversation_id,
        })
    }

    pub async fn status(&self) -> Result<ServiceStatus, ServiceError> {
        let index = Arc::clone(&self.index);
        let summary = tokio::task::spawn_blocking(move || index.summary()).await??;

        Ok(ServiceStatus {
            status: "ok".to_string(),
            started_at: self.started_at,
            documents_dir: self.pipeline.documents_dir().to_path_buf(),
            index_kind: summary.kind,
            metric: summary.metric,
            dimension: summary.dimension,
            vectors: summary.vectors,
            chunks: summary.chunks,
            documents: summary.documents,
            keyword_docs: summary.keyword_docs,
            index_size_bytes: summary.size_bytes,
            embedding_model: self.index.embedder().info().name.clone(),
            default_model: self.generators.default_model().to_string(),
            models: self.generators.names(),
            retrieval_mode: self.settings.retrieval.mode,
        })
    }

    pub async fn documents(&self) -> Result<Vec<DocumentSummary>, ServiceError> {
        let index = Arc::clone(&self.index);
        Ok(tokio::task::spawn_blocking(move || index.documents()).await??)
    }
}
