//! # docqa-types
//!
//! Shared domain types for the docqa document question-answering service.
//!
//! - Documents: extracted pages and the chunks cut from them
//! - Answers: generated responses with source references
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use docqa_types::{DocumentPage, Settings};
//!
//! let settings = Settings::default();
//! assert_eq!(settings.retrieval.top_k, 5);
//! let page = DocumentPage::new("docs/handbook.txt", 1, "Welcome");
//! assert_eq!(page.file_name, "handbook.txt");
//! ```

pub mod config;
pub mod document;
pub mod error;

pub use config::{
    ChunkingSettings, DistanceMetric, EmbeddingSettings, ExtractionSettings, GenerationSettings,
    IndexKind, IndexSettings, ModelProfile, RetrievalSettings, ServerSettings, Settings,
};
pub use document::{
    snippet, Answer, Chunk, DocumentPage, DocumentSummary, Reference, RetrievalMode,
    SNIPPET_CHARS,
};
pub use error::DocqaError;
