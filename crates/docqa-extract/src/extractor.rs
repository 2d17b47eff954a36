//! The extractor trait implemented by each document format.

use docqa_types::DocumentPage;
use std::path::Path;

use crate::error::ExtractError;

/// Turns one file into per-page text.
///
/// Extraction is blocking; async callers should run it on
/// `tokio::task::spawn_blocking`.
pub trait ContentExtractor: Send + Sync {
    /// Short name used in logs ("pdf", "docx", "text").
    fn name(&self) -> &str;

    /// Lowercase file extensions this extractor handles, without the dot.
    fn extensions(&self) -> &[&str];

    fn can_extract_by_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    /// Extract the non-empty pages of `path`, numbered from 1.
    fn extract(&self, path: &Path) -> Result<Vec<DocumentPage>, ExtractError>;
}

/// Build pages from `(page_number, text)` pairs, dropping blank ones.
pub(crate) fn non_empty_pages(
    path: &Path,
    pages: impl IntoIterator<Item = (u32, String)>,
) -> Vec<DocumentPage> {
    pages
        .into_iter()
        .filter_map(|(number, text)| {
            if text.trim().is_empty() {
                tracing::debug!(path = %path.display(), page = number, "Skipping empty page");
                None
            } else {
                Some(DocumentPage::new(path, number, text))
            }
        })
        .collect()
}
