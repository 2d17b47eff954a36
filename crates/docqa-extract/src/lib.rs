//! # docqa-extract
//!
//! Turns a directory of documents into page text and overlapping chunks.
//!
//! Supported formats: PDF (per page), DOCX and plain text / Markdown.
//! Unsupported extensions are rejected by [`ExtractorRegistry::extract`]
//! and skipped by [`extract_directory`]; files that fail to parse are
//! logged and reported without stopping the scan.

pub mod clean;
pub mod docx;
pub mod error;
pub mod extractor;
pub mod pdf;
pub mod registry;
pub mod splitter;
pub mod text;
pub mod walk;

pub use clean::clean_text;
pub use docx::DocxExtractor;
pub use error::ExtractError;
pub use extractor::ContentExtractor;
pub use pdf::PdfExtractor;
pub use registry::ExtractorRegistry;
pub use splitter::{chunk_pages, PageChunk, RecursiveSplitter};
pub use text::TextExtractor;
pub use walk::{extract_directory, extract_file, ExtractOptions, ExtractionReport};
