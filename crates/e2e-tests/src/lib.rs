//! End-to-end test infrastructure for docqa.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full extract-to-answer pipeline.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;

use docqa_embeddings::{EmbeddingModel, HashEmbedder};
use docqa_generate::{Generator, GeneratorRegistry, MockGenerator};
use docqa_service::{router, DocumentQaService};
use docqa_types::Settings;

/// Embedding width used by every harness.
pub const TEST_DIMENSION: usize = 256;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding the documents directory and the index
/// data directory, plus settings pointing at both.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub settings: Settings,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let mut settings = Settings::default();
        settings.documents_dir = temp_dir.path().join("docs").to_string_lossy().to_string();
        settings.data_dir = temp_dir.path().join("data").to_string_lossy().to_string();
        settings.generation.default_model = "mock".to_string();
        std::fs::create_dir_all(settings.expanded_documents_dir())
            .expect("Failed to create documents dir");

        Self {
            _temp_dir: temp_dir,
            settings,
        }
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.settings.expanded_documents_dir()
    }

    /// Write a plain text or markdown document.
    pub fn write_text(&self, name: &str, text: &str) -> PathBuf {
        let path = self.documents_dir().join(name);
        std::fs::write(&path, text).expect("Failed to write document");
        path
    }

    /// Write a DOCX with one paragraph per entry.
    pub fn write_docx(&self, name: &str, paragraphs: &[&str]) -> PathBuf {
        let path = self.documents_dir().join(name);
        let bytes = docx_bytes(paragraphs);
        std::fs::write(&path, bytes).expect("Failed to write docx");
        path
    }

    /// Open the service with the hash embedder and `generator` as "mock".
    pub async fn open_with(&self, generator: Arc<dyn Generator>) -> Arc<DocumentQaService> {
        let embedder: Arc<dyn EmbeddingModel> =
            Arc::new(HashEmbedder::new(TEST_DIMENSION).expect("Failed to build embedder"));
        let generators = GeneratorRegistry::new("mock").with("mock", generator);
        let service = DocumentQaService::open(self.settings.clone(), embedder, generators)
            .await
            .expect("Failed to open service");
        Arc::new(service)
    }

    pub async fn open(&self) -> Arc<DocumentQaService> {
        self.open_with(Arc::new(MockGenerator::new())).await
    }

    /// Router over a freshly opened service.
    pub async fn app(&self) -> Router {
        router(self.open().await)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal DOCX package: just `word/document.xml`.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{p}</w:t></w:r></w:p>"#))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .expect("Failed to start docx part");
    zip.write_all(xml.as_bytes())
        .expect("Failed to write docx part");
    zip.finish().expect("Failed to finish docx").into_inner()
}

/// Remove the vector index files so the next open has to rebuild.
pub fn remove_vector_index(settings: &Settings) {
    let path = settings.vector_index_path();
    if path.exists() {
        std::fs::remove_dir_all(&path).expect("Failed to remove vector index");
    }
}

/// Parse a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
