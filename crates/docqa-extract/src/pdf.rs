//! PDF extractor.
//!
//! Text is read page by page with lopdf. Files whose pages yield nothing
//! that way (unusual font encodings, some scanned-then-OCRed PDFs) are run
//! through pdf-extract as a whole and split on form feeds.

use docqa_types::DocumentPage;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::extractor::{non_empty_pages, ContentExtractor};

#[derive(Debug, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path) -> Result<Vec<DocumentPage>, ExtractError> {
        debug!(path = %path.display(), "Extracting PDF");
        let bytes = std::fs::read(path)?;

        let pages = match extract_pages_lopdf(&bytes) {
            Ok(pages) if pages.iter().any(|(_, text)| !text.trim().is_empty()) => pages,
            Ok(_) => {
                debug!(path = %path.display(), "No text via lopdf, trying pdf-extract");
                extract_pages_fallback(&bytes).map_err(|e| ExtractError::parse(path, e))?
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "lopdf failed, trying pdf-extract");
                extract_pages_fallback(&bytes).map_err(|e| ExtractError::parse(path, e))?
            }
        };

        Ok(non_empty_pages(path, pages))
    }
}

/// Per-page text using lopdf's content stream decoder.
fn extract_pages_lopdf(bytes: &[u8]) -> Result<Vec<(u32, String)>, String> {
    let doc = Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => pages.push((*page_number, text)),
            Err(e) => debug!(page = page_number, error = %e, "Page text extraction failed"),
        }
    }
    Ok(pages)
}

/// Whole-document text using pdf-extract, which separates pages with `\x0c`.
/// pdf-extract can panic on malformed input, so the call is unwound here.
fn extract_pages_fallback(bytes: &[u8]) -> Result<Vec<(u32, String)>, String> {
    let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| "pdf-extract panicked".to_string())?
        .map_err(|e| e.to_string())?;
    Ok(text
        .split('\x0c')
        .enumerate()
        .map(|(i, page)| ((i + 1) as u32, page.to_string()))
        .collect())
}
