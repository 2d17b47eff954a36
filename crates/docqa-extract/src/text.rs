//! Plain text and Markdown extractor.

use docqa_types::DocumentPage;
use std::path::Path;

use crate::error::ExtractError;
use crate::extractor::{non_empty_pages, ContentExtractor};

/// Reads text files as a single page; invalid UTF-8 is replaced, not rejected.
#[derive(Debug, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for TextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "markdown"]
    }

    fn extract(&self, path: &Path) -> Result<Vec<DocumentPage>, ExtractError> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(non_empty_pages(path, [(1, text)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_text_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Line one\nLine two").unwrap();

        let pages = TextExtractor::new().extract(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].file_name, "notes.txt");
        assert_eq!(pages[0].page_number, 1);
        assert_eq!(pages[0].text, "Line one\nLine two");
    }

    #[test]
    fn test_blank_file_has_no_pages() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.md");
        std::fs::write(&path, "  \n\n ").unwrap();

        assert!(TextExtractor::new().extract(&path).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, b"caf\xe9 menu").unwrap();

        let pages = TextExtractor::new().extract(&path).unwrap();
        assert!(pages[0].text.starts_with("caf"));
        assert!(pages[0].text.ends_with("menu"));
    }

    #[test]
    fn test_extension_matching_ignores_case() {
        let extractor = TextExtractor::new();
        assert!(extractor.can_extract_by_extension(Path::new("README.MD")));
        assert!(!extractor.can_extract_by_extension(Path::new("report.pdf")));
        assert!(!extractor.can_extract_by_extension(Path::new("Makefile")));
    }
}
