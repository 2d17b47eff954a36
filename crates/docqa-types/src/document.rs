//! Document, chunk and answer types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::DocqaError;

/// Maximum characters kept in a reference snippet.
pub const SNIPPET_CHARS: usize = 200;

/// Text of one page of a source document.
///
/// Formats without a page structure (plain text, DOCX) produce a single
/// page numbered 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPage {
    /// Base name of the source file
    pub file_name: String,
    /// Full path the page was read from
    pub path: PathBuf,
    /// 1-based page number
    pub page_number: u32,
    /// Extracted text
    pub text: String,
}

impl DocumentPage {
    pub fn new(path: impl Into<PathBuf>, page_number: u32, text: impl Into<String>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            file_name,
            path,
            page_number,
            text: text.into(),
        }
    }
}

/// A retrievable slice of a page, keyed by its vector id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: u64,
    pub file_name: String,
    pub page_number: u32,
    /// Position of the chunk within its page
    pub chunk_index: u32,
    pub text: String,
}

/// Source reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub file_name: String,
    pub page_number: u32,
    pub snippet: String,
    pub score: f32,
}

impl Reference {
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            file_name: chunk.file_name.clone(),
            page_number: chunk.page_number,
            snippet: snippet(&chunk.text),
            score,
        }
    }
}

/// Truncate text to [`SNIPPET_CHARS`] characters, appending `...` when cut.
pub fn snippet(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SNIPPET_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(SNIPPET_CHARS).collect();
    out.push_str("...");
    out
}

/// Generated answer with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub references: Vec<Reference>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Per-file counts reported by the document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub file_name: String,
    pub pages: u32,
    pub chunks: u64,
}

/// Which index answers a retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Nearest neighbours in embedding space
    #[default]
    Vector,
    /// BM25 keyword relevance
    Keyword,
    /// Both, fused with reciprocal rank fusion
    Hybrid,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalMode::Vector => write!(f, "vector"),
            RetrievalMode::Keyword => write!(f, "keyword"),
            RetrievalMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = DocqaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(RetrievalMode::Vector),
            "keyword" | "bm25" => Ok(RetrievalMode::Keyword),
            "hybrid" => Ok(RetrievalMode::Hybrid),
            other => Err(DocqaError::InvalidInput(format!(
                "unknown retrieval mode: {other}"
            ))),
        }
    }
}
