//! Extension-keyed registry of content extractors.

use docqa_types::DocumentPage;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::docx::DocxExtractor;
use crate::error::ExtractError;
use crate::extractor::ContentExtractor;
use crate::pdf::PdfExtractor;
use crate::text::TextExtractor;

/// Registry of content extractors.
#[derive(Clone)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn ContentExtractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Registry with the PDF, DOCX and text extractors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor::new());
        registry.register(DocxExtractor::new());
        registry.register(TextExtractor::new());
        registry
    }

    /// Register an extractor for every extension it declares, replacing
    /// any earlier registration.
    pub fn register<E: ContentExtractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn ContentExtractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Arc::clone(&extractor));
        }
    }

    pub fn get_for_path(&self, path: &Path) -> Option<Arc<dyn ContentExtractor>> {
        let ext = extension_of(path)?;
        self.by_extension.get(&ext).cloned()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.get_for_path(path).is_some()
    }

    /// Registered extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.by_extension.keys().cloned().collect();
        exts.sort();
        exts
    }

    /// Extract a file with the extractor registered for its extension.
    pub fn extract(&self, path: &Path) -> Result<Vec<DocumentPage>, ExtractError> {
        let extractor = self.get_for_path(path).ok_or_else(|| {
            ExtractError::UnsupportedType(extension_of(path).unwrap_or_else(|| "<none>".into()))
        })?;
        extractor.extract(path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}
